//! # Gestor Central de Jobs
//! src/jobs/manager.rs
//!
//! Dueño del pipeline completo: cola de jobs, workers, slots de ejecución,
//! cola de completados, monitor y store. Se construye una sola vez y la capa
//! HTTP lo comparte vía `Arc`.
//!
//! ## Apagado
//!
//! `shutdown()` es idempotente y sigue este orden:
//! 1. Marca el servicio como detenido (los submits nuevos fallan)
//! 2. Cierra la cola de jobs y los slots; los workers ociosos salen
//! 3. Los specs que quedaron en cola se registran como `failed`
//! 4. Espera a los workers
//! 5. Cierra la cola de completados y espera al monitor, que a su vez espera
//!    a los procesos en vuelo (o los mata al vencer el período de gracia)

use crate::config::Config;
use crate::error::{DispatchError, Result};
use crate::jobs::monitor::CompletionMonitor;
use crate::jobs::queue::{CompletionQueue, JobQueue};
use crate::jobs::slots::RunSlots;
use crate::jobs::storage::{JobStore, DEFAULT_LIST_LIMIT};
use crate::jobs::types::{JobRecord, JobSpec, JobStatus, SubmitParams, SubmitResponse};
use crate::jobs::worker::{spawn_workers, WorkerContext};
use crate::metrics::{MetricsCollector, PipelineGauges};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::thread::JoinHandle;
use std::time::Duration;

/// Configuración del Job Manager
#[derive(Debug, Clone)]
pub struct JobManagerConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    pub completion_capacity: usize,
    pub max_running: usize,

    /// Ejecutable que recibe el vector de argumentos de cada job
    pub runner: String,

    pub poll_interval: Duration,
    pub shutdown_grace: Duration,
    pub list_limit: usize,

    /// Si está presente, el stdout de cada job se guarda ahí
    pub output_dir: Option<PathBuf>,
}

impl Default for JobManagerConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            queue_capacity: 8,
            completion_capacity: 8,
            max_running: 8,
            runner: "spark2-submit".to_string(),
            poll_interval: Duration::from_millis(200),
            shutdown_grace: Duration::from_secs(30),
            list_limit: DEFAULT_LIST_LIMIT,
            output_dir: None,
        }
    }
}

impl JobManagerConfig {
    /// Crea una configuración desde el Config principal
    pub fn from_config(config: &Config) -> Self {
        Self {
            workers: config.workers,
            queue_capacity: config.queue_capacity(),
            completion_capacity: config.completion_capacity(),
            max_running: config.max_running(),
            runner: config.runner.clone(),
            poll_interval: config.poll_interval(),
            shutdown_grace: config.shutdown_grace(),
            list_limit: config.list_limit,
            output_dir: config.output_dir.clone(),
        }
    }
}

/// Gestor central de jobs
pub struct JobManager {
    config: JobManagerConfig,

    queue: JobQueue,
    completions: CompletionQueue,
    slots: RunSlots,
    store: JobStore,
    metrics: MetricsCollector,

    workers: Mutex<Vec<JoinHandle<()>>>,
    monitor: Mutex<Option<JoinHandle<()>>>,

    stopping: AtomicBool,
}

impl JobManager {
    /// Arma el pipeline y arranca los workers y el monitor
    pub fn start(config: JobManagerConfig, store: JobStore, metrics: MetricsCollector) -> Result<Self> {
        let queue = JobQueue::new(config.queue_capacity);
        let completions = CompletionQueue::new(config.completion_capacity);
        let slots = RunSlots::new(config.max_running);

        let monitor = CompletionMonitor::new(
            completions.clone(),
            store.clone(),
            slots.clone(),
            metrics.clone(),
            config.poll_interval,
            config.shutdown_grace,
        )
        .spawn()?;

        let ctx = WorkerContext {
            queue: queue.clone(),
            completions: completions.clone(),
            store: store.clone(),
            slots: slots.clone(),
            metrics: metrics.clone(),
            output_dir: config.output_dir.clone(),
        };
        let workers = match spawn_workers(config.workers, &ctx) {
            Ok(workers) => workers,
            Err(e) => {
                // Los workers ya lanzados y el monitor salen al cerrar las colas
                queue.close();
                slots.close();
                completions.close();
                return Err(e);
            }
        };

        tracing::info!(
            workers = config.workers,
            max_running = config.max_running,
            runner = %config.runner,
            "Job manager started"
        );

        Ok(Self {
            config,
            queue,
            completions,
            slots,
            store,
            metrics,
            workers: Mutex::new(workers),
            monitor: Mutex::new(Some(monitor)),
            stopping: AtomicBool::new(false),
        })
    }

    /// Admite un job y lo encola.
    ///
    /// Bloquea mientras la cola esté llena. Falla con `QueueClosed` si el
    /// servicio se está apagando.
    pub fn submit(&self, params: SubmitParams) -> Result<SubmitResponse> {
        if self.is_shutting_down() {
            return Err(DispatchError::QueueClosed);
        }
        if params.program.trim().is_empty() {
            return Err(DispatchError::MissingArtifact("py"));
        }

        let spec = JobSpec::build(&self.config.runner, &params);
        let response = SubmitResponse {
            job_id: spec.job_id().to_string(),
            name: spec.name().to_string(),
            status: JobStatus::Running,
        };

        self.queue.enqueue(spec)?;
        self.metrics.record_submitted();

        tracing::info!(job_id = %response.job_id, name = %response.name, "Job submitted");
        Ok(response)
    }

    /// Registro de un job; `None` si el ID no existe (o aún no arrancó)
    pub fn get(&self, job_id: &str) -> Option<JobRecord> {
        self.store.get(job_id)
    }

    /// Los registros más recientes según `list_limit`
    pub fn list_recent(&self) -> Vec<JobRecord> {
        self.store.list_recent(self.config.list_limit)
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Valores instantáneos del pipeline para `/metrics`
    pub fn gauges(&self) -> PipelineGauges {
        PipelineGauges {
            queued: self.queue.len(),
            queue_capacity: self.queue.capacity(),
            running: self.slots.running(),
            max_running: self.slots.total(),
            stored_records: self.store.count(),
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    /// Apaga el pipeline en orden. Llamadas repetidas no hacen nada.
    pub fn shutdown(&self) {
        if self.stopping.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!("Job manager shutting down");

        self.queue.close();
        self.slots.close();
        self.abandon_queued();

        let workers = std::mem::take(&mut *lock(&self.workers));
        for handle in workers {
            if handle.join().is_err() {
                tracing::error!("Worker thread panicked");
            }
        }

        // Un worker pudo sacar un spec entre el cierre y el drenado
        self.abandon_queued();

        self.completions.close();
        if let Some(handle) = lock(&self.monitor).take() {
            if handle.join().is_err() {
                tracing::error!("Completion monitor thread panicked");
            }
        }

        tracing::info!(stored_records = self.store.count(), "Job manager stopped");
    }

    /// Registra como `failed` los specs que nunca llegaron a un worker
    fn abandon_queued(&self) {
        while let Some(spec) = self.queue.try_dequeue() {
            tracing::warn!(job_id = spec.job_id(), "Discarding queued job on shutdown");
            let record = JobRecord::never_started(&spec, Utc::now());
            if let Err(e) = self.store.upsert(&record) {
                tracing::error!(job_id = spec.job_id(), error = %e, "Failed to store discarded job");
            }
            self.metrics.record_failed();
        }
    }
}

impl Drop for JobManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use std::thread;
    use std::time::Instant;
    use tempfile::TempDir;

    /// Runner de prueba: ejecuta el último argumento (el "programa") con sh
    fn stub_runner(dir: &Path) -> String {
        let path = dir.join("runner.sh");
        fs::write(&path, "#!/bin/sh\nfor last; do :; done\nexec sh \"$last\"\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    fn program(dir: &Path, name: &str, body: &str) -> String {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        path.display().to_string()
    }

    fn manager(dir: &TempDir, workers: usize, queue_capacity: usize) -> JobManager {
        let config = JobManagerConfig {
            workers,
            queue_capacity,
            completion_capacity: workers,
            max_running: workers,
            runner: stub_runner(dir.path()),
            poll_interval: Duration::from_millis(20),
            shutdown_grace: Duration::from_secs(5),
            ..JobManagerConfig::default()
        };
        let store = JobStore::open(dir.path().join("jobs.json")).unwrap();
        JobManager::start(config, store, MetricsCollector::new()).unwrap()
    }

    fn wait_for_status(manager: &JobManager, job_id: &str, status: JobStatus) -> JobRecord {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            if let Some(record) = manager.get(job_id) {
                if record.status() == status {
                    return record;
                }
            }
            assert!(Instant::now() < deadline, "job {} never reached {:?}", job_id, status);
            thread::sleep(Duration::from_millis(20));
        }
    }

    #[test]
    fn test_submit_runs_to_finished() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, 2, 2);
        let pi = program(dir.path(), "pi.py", "sleep 0.1; exit 0\n");

        let response = manager
            .submit(
                SubmitParams::new(pi.clone())
                    .with_name("pi computer")
                    .with_executor_cores("2")
                    .with_num_executors("2"),
            )
            .unwrap();

        assert_eq!(response.name, "pi computer");
        assert_eq!(response.status, JobStatus::Running);

        let record = wait_for_status(&manager, &response.job_id, JobStatus::Finished);
        assert_eq!(record.py_file(), pi);
        assert!(record.end_time().unwrap() > record.start_time());

        manager.shutdown();
        assert_eq!(manager.metrics().job_counters().finished, 1);
    }

    #[test]
    fn test_nonzero_exit_is_failed() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, 1, 1);
        let bad = program(dir.path(), "bad.py", "exit 1\n");

        let response = manager.submit(SubmitParams::new(bad)).unwrap();
        wait_for_status(&manager, &response.job_id, JobStatus::Failed);
    }

    #[test]
    fn test_missing_program_rejected() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, 1, 1);

        let err = manager.submit(SubmitParams::new("")).unwrap_err();
        assert!(err.is_admission());
        assert!(manager.list_recent().is_empty());
        assert_eq!(manager.metrics().job_counters().submitted, 0);
    }

    #[test]
    fn test_at_most_max_running() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, 2, 4);

        // Cada proceso deja un marcador mientras corre
        let markers = dir.path().join("markers");
        fs::create_dir(&markers).unwrap();
        let slow = program(
            dir.path(),
            "slow.py",
            &format!(
                "touch {dir}/$$\nsleep 0.3\nrm {dir}/$$\n",
                dir = markers.display()
            ),
        );

        let ids: Vec<String> = (0..6)
            .map(|_| manager.submit(SubmitParams::new(slow.clone())).unwrap().job_id)
            .collect();

        let mut peak = 0;
        let deadline = Instant::now() + Duration::from_secs(15);
        loop {
            peak = peak.max(fs::read_dir(&markers).unwrap().count());

            let finished = ids
                .iter()
                .filter(|id| manager.get(id).map_or(false, |r| r.is_terminal()))
                .count();
            if finished == ids.len() {
                break;
            }
            assert!(Instant::now() < deadline);
            thread::sleep(Duration::from_millis(5));
        }

        assert!(peak <= 2, "{} processes ran at once", peak);
        assert_eq!(peak, 2);
        assert_eq!(manager.gauges().running, 0);
    }

    #[test]
    fn test_idle_workers_not_reported_running() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, 4, 4);
        thread::sleep(Duration::from_millis(200));

        let gauges = manager.gauges();
        assert_eq!(gauges.running, 0);
        assert_eq!(gauges.max_running, 4);

        let slow = program(dir.path(), "slow.py", "sleep 0.5\n");
        let job_id = manager.submit(SubmitParams::new(slow)).unwrap().job_id;
        wait_for_status(&manager, &job_id, JobStatus::Running);
        assert_eq!(manager.gauges().running, 1);

        wait_for_status(&manager, &job_id, JobStatus::Finished);
        assert_eq!(manager.gauges().running, 0);
    }

    #[test]
    fn test_submit_after_shutdown_fails() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, 1, 1);
        manager.shutdown();

        let ok = program(dir.path(), "ok.py", "exit 0\n");
        let err = manager.submit(SubmitParams::new(ok)).unwrap_err();
        assert!(matches!(err, DispatchError::QueueClosed));

        // Idempotente
        manager.shutdown();
    }

    #[test]
    fn test_shutdown_records_queued_jobs_failed() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, 1, 4);
        let slow = program(dir.path(), "slow.py", "sleep 0.3\n");

        let first = manager.submit(SubmitParams::new(slow.clone())).unwrap().job_id;
        wait_for_status(&manager, &first, JobStatus::Running);

        let queued: Vec<String> = (0..3)
            .map(|_| manager.submit(SubmitParams::new(slow.clone())).unwrap().job_id)
            .collect();

        manager.shutdown();

        // El job en vuelo terminó normalmente dentro del período de gracia
        assert_eq!(manager.get(&first).unwrap().status(), JobStatus::Finished);

        // Ningún job admitido quedó sin estado terminal
        for id in &queued {
            let record = manager.get(id).unwrap();
            assert!(record.is_terminal());
        }
        assert_eq!(manager.gauges().running, 0);
    }
}
