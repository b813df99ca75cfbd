//! # Pool de Workers
//! src/jobs/worker.rs
//!
//! Cada worker repite:
//! 1. Toma un slot de ejecución y saca un `JobSpec` de la cola (bloqueante)
//! 2. Lanza el runner con el vector de argumentos del spec
//! 3. Escribe el registro `running` en el store
//! 4. Entrega el proceso al monitor por la cola de completados
//!
//! Los workers no reintentan ni se comunican entre sí.

use crate::error::{DispatchError, Result};
use crate::jobs::queue::{CompletionQueue, JobQueue};
use crate::jobs::slots::RunSlots;
use crate::jobs::storage::JobStore;
use crate::jobs::types::{JobRecord, JobSpec, JobStatus, ProcessHandle};
use crate::metrics::MetricsCollector;
use chrono::Utc;
use std::fs::{self, File};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};

/// Todo lo que comparte un worker con el resto del pipeline
#[derive(Clone)]
pub struct WorkerContext {
    pub queue: JobQueue,
    pub completions: CompletionQueue,
    pub store: JobStore,
    pub slots: RunSlots,
    pub metrics: MetricsCollector,

    /// Directorio donde se guarda el stdout de cada job (solo diagnóstico)
    pub output_dir: Option<PathBuf>,
}

/// Lanza `count` workers con nombre `worker-<i>`
pub fn spawn_workers(count: usize, ctx: &WorkerContext) -> Result<Vec<JoinHandle<()>>> {
    let mut handles = Vec::with_capacity(count);

    for i in 0..count {
        let ctx = ctx.clone();
        let name = format!("worker-{}", i);

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || worker_loop(&name, &ctx))?;

        handles.push(handle);
    }

    Ok(handles)
}

/// Loop principal del worker. Termina cuando la cola o los slots se cierran.
fn worker_loop(name: &str, ctx: &WorkerContext) {
    tracing::debug!(worker = name, "Worker started");

    loop {
        if !ctx.slots.acquire() {
            break;
        }

        let spec = match ctx.queue.dequeue() {
            Some(spec) => spec,
            None => {
                ctx.slots.release();
                break;
            }
        };

        tracing::info!(worker = name, job_id = spec.job_id(), "Worker picked up job");
        run_job(name, ctx, spec);
    }

    tracing::debug!(worker = name, "Worker stopped");
}

/// Lanza el proceso y lo entrega al monitor.
///
/// Si el spawn falla el job queda registrado como `failed`: nunca desaparece
/// sin dejar un estado terminal.
fn run_job(name: &str, ctx: &WorkerContext, spec: JobSpec) {
    let child = match spawn_runner(&spec, ctx.output_dir.as_ref()) {
        Ok(child) => child,
        Err(e) => {
            tracing::error!(worker = name, job_id = spec.job_id(), error = %e, "Failed to spawn job");
            record_spawn_failure(ctx, &spec);
            ctx.slots.release();
            return;
        }
    };

    ctx.slots.mark_running();

    let record = JobRecord::running(&spec, Utc::now());
    if let Err(e) = ctx.store.upsert(&record) {
        tracing::error!(worker = name, job_id = spec.job_id(), error = %e, "Failed to store running record");
    }

    tracing::info!(
        worker = name,
        job_id = spec.job_id(),
        pid = child.id(),
        "Job process started"
    );

    let handle = ProcessHandle::new(spec.job_id().to_string(), child);
    if let Err(DispatchError::QueueClosed) = ctx.completions.enqueue(handle) {
        // Solo ocurre si la cola de completados se cerró antes que los workers
        tracing::error!(worker = name, job_id = spec.job_id(), "Completion queue closed, job abandoned");
        let failed = record.finish(JobStatus::Failed, Utc::now());
        if let Err(e) = ctx.store.upsert(&failed) {
            tracing::error!(job_id = spec.job_id(), error = %e, "Failed to store failed record");
        }
        ctx.metrics.record_failed();
        ctx.slots.finish();
    }
}

/// Crea el proceso del runner. stdout va a un archivo por job o se descarta.
pub(crate) fn spawn_runner(spec: &JobSpec, output_dir: Option<&PathBuf>) -> Result<Child> {
    let stdout = match output_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            Stdio::from(File::create(dir.join(format!("{}.out", spec.job_id())))?)
        }
        None => Stdio::null(),
    };

    Command::new(spec.runner())
        .args(spec.runner_args())
        .stdin(Stdio::null())
        .stdout(stdout)
        .spawn()
        .map_err(|source| DispatchError::Spawn {
            runner: spec.runner().to_string(),
            source,
        })
}

fn record_spawn_failure(ctx: &WorkerContext, spec: &JobSpec) {
    let record = JobRecord::never_started(spec, Utc::now());
    if let Err(e) = ctx.store.upsert(&record) {
        tracing::error!(job_id = spec.job_id(), error = %e, "Failed to store spawn failure");
    }
    ctx.metrics.record_spawn_failure();
}
