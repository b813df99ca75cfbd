//! # Monitor de Completados
//! src/jobs/monitor.rs
//!
//! Un único thread que reconcilia el código de salida de cada proceso con su
//! registro en el store:
//!
//! ```text
//! cola de completados ──► en vuelo ──try_wait──► finished / failed ──► store
//! ```
//!
//! Los procesos que siguen corriendo quedan en un conjunto local y se vuelven
//! a consultar en cada tick. Entre ticks el monitor espera en la cola de
//! completados con timeout, así un proceso nuevo lo despierta de inmediato.
//!
//! Al cerrarse la cola espera a los procesos en vuelo hasta agotar el período
//! de gracia; los que sobreviven se matan y quedan como `failed`.

use crate::jobs::queue::{CompletionQueue, Dequeued};
use crate::jobs::slots::RunSlots;
use crate::jobs::storage::JobStore;
use crate::jobs::types::{JobStatus, ProcessHandle};
use crate::metrics::MetricsCollector;
use chrono::Utc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub struct CompletionMonitor {
    completions: CompletionQueue,
    store: JobStore,
    slots: RunSlots,
    metrics: MetricsCollector,
    poll_interval: Duration,
    shutdown_grace: Duration,
    in_flight: Vec<ProcessHandle>,
}

impl CompletionMonitor {
    pub fn new(
        completions: CompletionQueue,
        store: JobStore,
        slots: RunSlots,
        metrics: MetricsCollector,
        poll_interval: Duration,
        shutdown_grace: Duration,
    ) -> Self {
        Self {
            completions,
            store,
            slots,
            metrics,
            poll_interval,
            shutdown_grace,
            in_flight: Vec::new(),
        }
    }

    /// Corre el monitor en su propio thread
    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("completion-monitor".to_string())
            .spawn(move || self.run())
    }

    /// Loop principal. Retorna cuando la cola está cerrada y no queda nada en vuelo.
    pub fn run(mut self) {
        tracing::debug!("Completion monitor started");
        let mut closed_at: Option<Instant> = None;

        loop {
            if closed_at.is_none() && !self.receive() {
                tracing::info!(in_flight = self.in_flight.len(), "Completion queue closed, draining");
                closed_at = Some(Instant::now());
            }

            self.reap();

            if let Some(since) = closed_at {
                if self.in_flight.is_empty() {
                    break;
                }
                if since.elapsed() >= self.shutdown_grace {
                    self.terminate_all();
                    break;
                }
                thread::sleep(self.poll_interval);
            }
        }

        tracing::debug!("Completion monitor stopped");
    }

    /// Recibe procesos nuevos. Retorna `false` cuando la cola se cerró.
    ///
    /// Sin nada en vuelo bloquea hasta que llegue algo; con procesos en vuelo
    /// espera como máximo un `poll_interval`.
    fn receive(&mut self) -> bool {
        if self.in_flight.is_empty() {
            match self.completions.dequeue() {
                Some(handle) => self.track(handle),
                None => return false,
            }
        } else {
            match self.completions.dequeue_timeout(self.poll_interval) {
                Dequeued::Item(handle) => self.track(handle),
                Dequeued::Timeout => {}
                Dequeued::Closed => return false,
            }
        }

        while let Some(handle) = self.completions.try_dequeue() {
            self.track(handle);
        }

        true
    }

    fn track(&mut self, handle: ProcessHandle) {
        tracing::debug!(job_id = %handle.job_id, "Tracking job process");
        self.in_flight.push(handle);
    }

    /// Consulta sin bloquear cada proceso en vuelo y finaliza los que salieron
    fn reap(&mut self) {
        let mut still_running = Vec::with_capacity(self.in_flight.len());

        for mut handle in self.in_flight.drain(..) {
            match handle.child.try_wait() {
                Ok(None) => still_running.push(handle),
                Ok(Some(exit)) => {
                    let status = JobStatus::from_exit_code(exit.code());
                    tracing::info!(
                        job_id = %handle.job_id,
                        exit_code = ?exit.code(),
                        status = status.as_str(),
                        "Job process exited"
                    );
                    finalize(&self.store, &self.slots, &self.metrics, &handle.job_id, status);
                }
                Err(e) => {
                    // Un handle roto no debe frenar al resto
                    tracing::error!(job_id = %handle.job_id, error = %e, "Failed to poll job process");
                    finalize(&self.store, &self.slots, &self.metrics, &handle.job_id, JobStatus::Failed);
                }
            }
        }

        self.in_flight = still_running;
    }

    /// Mata los procesos que sobrevivieron al período de gracia
    fn terminate_all(&mut self) {
        tracing::warn!(
            remaining = self.in_flight.len(),
            grace_ms = self.shutdown_grace.as_millis() as u64,
            "Shutdown grace period elapsed, terminating job processes"
        );

        for mut handle in self.in_flight.drain(..) {
            if let Err(e) = handle.child.kill() {
                tracing::error!(job_id = %handle.job_id, error = %e, "Failed to kill job process");
            }
            if let Err(e) = handle.child.wait() {
                tracing::error!(job_id = %handle.job_id, error = %e, "Failed to reap job process");
            }
            finalize(&self.store, &self.slots, &self.metrics, &handle.job_id, JobStatus::Failed);
        }
    }
}

/// Escribe el registro terminal y libera el slot del job
fn finalize(
    store: &JobStore,
    slots: &RunSlots,
    metrics: &MetricsCollector,
    job_id: &str,
    status: JobStatus,
) {
    slots.finish();

    let previous = match store.get(job_id) {
        Some(record) => record,
        None => {
            tracing::warn!(job_id, "No record for finished job, skipping");
            return;
        }
    };

    let terminal = previous.finish(status, Utc::now());

    // Contadores antes del upsert: quien vea el registro terminal ya los ve
    match terminal.status() {
        JobStatus::Finished => metrics.record_finished(),
        _ => metrics.record_failed(),
    }

    if let Err(e) = store.upsert(&terminal) {
        tracing::error!(job_id, error = %e, "Failed to store terminal record");
    }
}
