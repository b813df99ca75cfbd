//! # Configuración del Servicio
//! src/config.rs
//!
//! Argumentos CLI con fallback a variables de entorno.
//!
//! ## Ejemplos de uso
//!
//! ### CLI
//! ```bash
//! ./job_dispatch --port 8998 \
//!   --workers 8 \
//!   --queue-capacity 16 \
//!   --runner /opt/spark/bin/spark-submit
//! ```
//!
//! ### Variables de entorno
//! ```bash
//! DISPATCH_PORT=9000 DISPATCH_WORKERS=4 ./job_dispatch
//! ```

use crate::error::{DispatchError, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Configuración del servicio de despacho de jobs
#[derive(Debug, Clone, Parser)]
#[command(name = "job_dispatch")]
#[command(about = "Servicio de despacho de jobs batch sobre un runner externo")]
#[command(version)]
pub struct Config {
    /// Puerto en el que escucha la API
    #[arg(short, long, default_value = "8998", env = "DISPATCH_PORT")]
    pub port: u16,

    /// Host/IP en el que escucha la API
    #[arg(long, default_value = "0.0.0.0", env = "DISPATCH_HOST")]
    pub host: String,

    /// Directorio base para el store y los artefactos
    #[arg(long, default_value = "./data", env = "DISPATCH_DATA_DIR")]
    pub data_dir: PathBuf,

    /// Archivo JSON de registros (default: <data-dir>/jobs.json)
    #[arg(long, env = "DISPATCH_STORE_PATH")]
    pub store_path: Option<PathBuf>,

    /// Directorio donde se copian los artefactos (default: <data-dir>/job_files)
    #[arg(long, env = "DISPATCH_JOB_FILES_DIR")]
    pub job_files_dir: Option<PathBuf>,

    /// Directorio para el stdout de cada job; sin valor se descarta
    #[arg(long, env = "DISPATCH_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    // === Pipeline ===
    /// Número de workers que lanzan procesos
    #[arg(short, long, default_value = "8", env = "DISPATCH_WORKERS")]
    pub workers: usize,

    /// Capacidad de la cola de jobs (default: workers)
    #[arg(long, env = "DISPATCH_QUEUE_CAPACITY")]
    pub queue_capacity: Option<usize>,

    /// Capacidad de la cola de completados (default: workers)
    #[arg(long, env = "DISPATCH_COMPLETION_CAPACITY")]
    pub completion_capacity: Option<usize>,

    /// Máximo de jobs corriendo a la vez (default: workers)
    #[arg(long, env = "DISPATCH_MAX_RUNNING")]
    pub max_running: Option<usize>,

    /// Ejecutable que corre cada job
    #[arg(long, default_value = "spark2-submit", env = "DISPATCH_RUNNER")]
    pub runner: String,

    // === Tiempos ===
    /// Intervalo de consulta del monitor en milisegundos
    #[arg(long = "poll-interval-ms", default_value = "200", env = "DISPATCH_POLL_INTERVAL_MS")]
    pub poll_interval_ms: u64,

    /// Espera máxima por los procesos en vuelo al apagar, en milisegundos
    #[arg(long = "shutdown-grace-ms", default_value = "30000", env = "DISPATCH_SHUTDOWN_GRACE_MS")]
    pub shutdown_grace_ms: u64,

    // === API ===
    /// Cantidad de registros que devuelve `/jobs`
    #[arg(long = "list-limit", default_value = "20", env = "DISPATCH_LIST_LIMIT")]
    pub list_limit: usize,
}

impl Config {
    pub fn new() -> Self {
        Config::parse()
    }

    /// Dirección para bind (host:port)
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn store_path(&self) -> PathBuf {
        self.store_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("jobs.json"))
    }

    pub fn job_files_dir(&self) -> PathBuf {
        self.job_files_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("job_files"))
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity.unwrap_or(self.workers)
    }

    pub fn completion_capacity(&self) -> usize {
        self.completion_capacity.unwrap_or(self.workers)
    }

    pub fn max_running(&self) -> usize {
        self.max_running.unwrap_or(self.workers)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Rechaza valores que dejarían el pipeline sin poder avanzar
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(DispatchError::Config(msg.to_string()));

        if self.workers == 0 {
            return invalid("workers must be >= 1");
        }
        if self.queue_capacity() == 0 {
            return invalid("queue capacity must be >= 1");
        }
        if self.completion_capacity() == 0 {
            return invalid("completion capacity must be >= 1");
        }
        if self.max_running() == 0 {
            return invalid("max running must be >= 1");
        }
        if self.runner.trim().is_empty() {
            return invalid("runner must not be empty");
        }
        if self.poll_interval_ms == 0 {
            return invalid("poll interval must be > 0");
        }
        if self.list_limit == 0 {
            return invalid("list limit must be >= 1");
        }

        Ok(())
    }

    /// Resumen de la configuración efectiva en el log
    pub fn log_summary(&self) {
        tracing::info!(
            address = %self.address(),
            store = %self.store_path().display(),
            job_files = %self.job_files_dir().display(),
            runner = %self.runner,
            "Service configuration"
        );
        tracing::info!(
            workers = self.workers,
            queue_capacity = self.queue_capacity(),
            completion_capacity = self.completion_capacity(),
            max_running = self.max_running(),
            poll_interval_ms = self.poll_interval_ms,
            shutdown_grace_ms = self.shutdown_grace_ms,
            "Pipeline configuration"
        );
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8998,
            host: "0.0.0.0".to_string(),
            data_dir: PathBuf::from("./data"),
            store_path: None,
            job_files_dir: None,
            output_dir: None,
            workers: 8,
            queue_capacity: None,
            completion_capacity: None,
            max_running: None,
            runner: "spark2-submit".to_string(),
            poll_interval_ms: 200,
            shutdown_grace_ms: 30_000,
            list_limit: 20,
        }
    }
}
