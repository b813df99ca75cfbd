//! # Tipos y Estructuras para el Sistema de Jobs
//! src/jobs/types.rs
//!
//! Define los tipos fundamentales del pipeline de despacho:
//! - `JobSpec`: lo que se encola al admitir un job (inmutable)
//! - `ProcessHandle`: proceso en vuelo, solo vive entre workers y monitor
//! - `JobRecord`: el registro persistido del ciclo de vida

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::process::Child;
use uuid::Uuid;

/// Cores por executor cuando el cliente no los indica
pub const DEFAULT_EXECUTOR_CORES: &str = "1";

/// Número de executors cuando el cliente no lo indica
pub const DEFAULT_NUM_EXECUTORS: &str = "2";

/// Estado de un job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Proceso lanzado, aún sin código de salida
    Running,

    /// El proceso terminó con código 0
    Finished,

    /// El proceso terminó con código distinto de 0 (o nunca arrancó)
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Finished => "finished",
            JobStatus::Failed => "failed",
        }
    }

    /// Traduce el código de salida del runner. Sin código (matado por señal) es fallo.
    pub fn from_exit_code(code: Option<i32>) -> Self {
        match code {
            Some(0) => JobStatus::Finished,
            _ => JobStatus::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

/// Parámetros de una submission ya validada.
///
/// `program` y `bundle` son rutas de artefactos ya copiados al directorio de jobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitParams {
    pub name: String,
    pub executor_cores: String,
    pub num_executors: String,
    pub program: String,
    pub bundle: Option<String>,
}

impl SubmitParams {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            executor_cores: DEFAULT_EXECUTOR_CORES.to_string(),
            num_executors: DEFAULT_NUM_EXECUTORS.to_string(),
            program: program.into(),
            bundle: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Un valor vacío conserva el default
    pub fn with_executor_cores(mut self, cores: impl Into<String>) -> Self {
        let cores = cores.into();
        if !cores.trim().is_empty() {
            self.executor_cores = cores;
        }
        self
    }

    /// Un valor vacío conserva el default
    pub fn with_num_executors(mut self, executors: impl Into<String>) -> Self {
        let executors = executors.into();
        if !executors.trim().is_empty() {
            self.num_executors = executors;
        }
        self
    }

    pub fn with_bundle(mut self, bundle: impl Into<String>) -> Self {
        self.bundle = Some(bundle.into());
        self
    }

    /// Nombre efectivo: si el cliente no manda nombre se usa la ruta del programa
    pub fn effective_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.program
        } else {
            &self.name
        }
    }
}

/// Payload inmutable que viaja por la cola de jobs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    job_id: String,
    name: String,
    program: String,
    command: Vec<String>,
}

impl JobSpec {
    /// Construye el spec con un ID nuevo y el vector de argumentos del runner:
    ///
    /// ```text
    /// <runner> --name <name> --executor-cores <n> --num-executors <m> [--py-files <bundle>] <program>
    /// ```
    pub fn build(runner: &str, params: &SubmitParams) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), runner, params)
    }

    pub fn with_id(job_id: String, runner: &str, params: &SubmitParams) -> Self {
        let name = params.effective_name().to_string();

        let mut command = vec![
            runner.to_string(),
            "--name".to_string(),
            name.clone(),
            "--executor-cores".to_string(),
            params.executor_cores.clone(),
            "--num-executors".to_string(),
            params.num_executors.clone(),
        ];

        if let Some(ref bundle) = params.bundle {
            command.push("--py-files".to_string());
            command.push(bundle.clone());
        }
        command.push(params.program.clone());

        Self {
            job_id,
            name,
            program: params.program.clone(),
            command,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Vector completo; el primer elemento es el ejecutable
    pub fn command(&self) -> &[String] {
        &self.command
    }

    pub fn runner(&self) -> &str {
        &self.command[0]
    }

    pub fn runner_args(&self) -> &[String] {
        &self.command[1..]
    }
}

/// Proceso lanzado por un worker, pendiente de reconciliar por el monitor
#[derive(Debug)]
pub struct ProcessHandle {
    pub job_id: String,
    pub child: Child,
}

impl ProcessHandle {
    pub fn new(job_id: String, child: Child) -> Self {
        Self { job_id, child }
    }
}

/// Registro persistido de un job.
///
/// Es un valor inmutable: las transiciones producen un registro nuevo a partir
/// del anterior en vez de modificar campos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    job_id: String,
    name: String,
    status: JobStatus,
    py_file: String,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
}

impl JobRecord {
    /// Registro inicial escrito por el worker al lanzar el proceso
    pub fn running(spec: &JobSpec, start_time: DateTime<Utc>) -> Self {
        Self {
            job_id: spec.job_id().to_string(),
            name: spec.name().to_string(),
            status: JobStatus::Running,
            py_file: spec.program().to_string(),
            start_time,
            end_time: None,
        }
    }

    /// Registro terminal para un job cuyo proceso nunca arrancó (spawn fallido
    /// o descartado de la cola al apagar el servicio)
    pub fn never_started(spec: &JobSpec, at: DateTime<Utc>) -> Self {
        Self {
            status: JobStatus::Failed,
            end_time: Some(at),
            ..Self::running(spec, at)
        }
    }

    /// Transición terminal. Conserva name, py_file y start_time.
    ///
    /// Un registro ya terminal (o un `status` Running) devuelve el mismo valor:
    /// el estado nunca retrocede y `end_time` se fija una sola vez.
    pub fn finish(&self, status: JobStatus, at: DateTime<Utc>) -> Self {
        if self.status.is_terminal() || !status.is_terminal() {
            return self.clone();
        }

        Self {
            status,
            end_time: Some(at.max(self.start_time)),
            ..self.clone()
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn py_file(&self) -> &str {
        &self.py_file
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Respuesta de `/submit`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub job_id: String,
    pub name: String,
    pub status: JobStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn pi_params() -> SubmitParams {
        SubmitParams::new("/srv/job_files/pi.py")
            .with_name("pi computer")
            .with_executor_cores("2")
            .with_num_executors("2")
    }

    #[test]
    fn test_job_status_serialization() {
        let json = serde_json::to_string(&JobStatus::Running).unwrap();
        assert_eq!(json, "\"running\"");
        let json = serde_json::to_string(&JobStatus::Finished).unwrap();
        assert_eq!(json, "\"finished\"");
    }

    #[test]
    fn test_status_from_exit_code() {
        assert_eq!(JobStatus::from_exit_code(Some(0)), JobStatus::Finished);
        assert_eq!(JobStatus::from_exit_code(Some(1)), JobStatus::Failed);
        assert_eq!(JobStatus::from_exit_code(Some(-1)), JobStatus::Failed);
        assert_eq!(JobStatus::from_exit_code(None), JobStatus::Failed);
    }

    #[test]
    fn test_spec_command_layout() {
        let spec = JobSpec::build("spark2-submit", &pi_params());

        assert_eq!(
            spec.command(),
            &[
                "spark2-submit",
                "--name",
                "pi computer",
                "--executor-cores",
                "2",
                "--num-executors",
                "2",
                "/srv/job_files/pi.py",
            ]
        );
        assert_eq!(spec.runner(), "spark2-submit");
        assert_eq!(spec.runner_args().len(), 7);
    }

    #[test]
    fn test_spec_with_bundle_and_defaults() {
        let params = SubmitParams::new("etl.py")
            .with_executor_cores("")
            .with_bundle("deps.zip");
        let spec = JobSpec::build("runner", &params);

        assert_eq!(
            spec.command(),
            &[
                "runner",
                "--name",
                "etl.py",
                "--executor-cores",
                "1",
                "--num-executors",
                "2",
                "--py-files",
                "deps.zip",
                "etl.py",
            ]
        );
        assert_eq!(spec.name(), "etl.py");
    }

    #[test]
    fn test_spec_ids_are_unique() {
        let a = JobSpec::build("runner", &pi_params());
        let b = JobSpec::build("runner", &pi_params());
        assert_ne!(a.job_id(), b.job_id());
    }

    #[test]
    fn test_record_lifecycle() {
        let spec = JobSpec::with_id("job-1".to_string(), "runner", &pi_params());
        let start = Utc::now();
        let running = JobRecord::running(&spec, start);

        assert_eq!(running.status(), JobStatus::Running);
        assert!(running.end_time().is_none());

        let end = start + Duration::seconds(3);
        let finished = running.finish(JobStatus::Finished, end);
        assert_eq!(finished.status(), JobStatus::Finished);
        assert_eq!(finished.end_time(), Some(end));
        assert_eq!(finished.name(), "pi computer");
        assert_eq!(finished.py_file(), "/srv/job_files/pi.py");
        assert_eq!(finished.start_time(), start);

        // El registro anterior no cambió
        assert_eq!(running.status(), JobStatus::Running);
    }

    #[test]
    fn test_record_never_regresses() {
        let spec = JobSpec::with_id("job-2".to_string(), "runner", &pi_params());
        let start = Utc::now();
        let failed = JobRecord::running(&spec, start).finish(JobStatus::Failed, start);

        let again = failed.finish(JobStatus::Finished, start + Duration::seconds(10));
        assert_eq!(again, failed);

        let back = JobRecord::running(&spec, start).finish(JobStatus::Running, start);
        assert_eq!(back.status(), JobStatus::Running);
        assert!(back.end_time().is_none());
    }

    #[test]
    fn test_record_end_time_not_before_start() {
        let spec = JobSpec::with_id("job-3".to_string(), "runner", &pi_params());
        let start = Utc::now();
        let record = JobRecord::running(&spec, start)
            .finish(JobStatus::Finished, start - Duration::seconds(5));

        assert_eq!(record.end_time(), Some(start));
    }

    #[test]
    fn test_never_started_record() {
        let spec = JobSpec::with_id("job-4".to_string(), "runner", &pi_params());
        let now = Utc::now();
        let record = JobRecord::never_started(&spec, now);

        assert_eq!(record.status(), JobStatus::Failed);
        assert_eq!(record.start_time(), now);
        assert_eq!(record.end_time(), Some(now));
    }

    #[test]
    fn test_record_wire_format() {
        let spec = JobSpec::with_id("job-5".to_string(), "runner", &pi_params());
        let record = JobRecord::running(&spec, Utc::now());
        let value = serde_json::to_value(&record).unwrap();
        let obj = value.as_object().unwrap();

        let mut keys: Vec<&str> = obj.keys().map(|k| k.as_str()).collect();
        keys.sort();
        assert_eq!(
            keys,
            vec!["end_time", "job_id", "name", "py_file", "start_time", "status"]
        );
        assert_eq!(obj["status"], "running");
        assert!(obj["end_time"].is_null());
    }
}
