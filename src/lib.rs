//! # Job Dispatch
//! src/lib.rs
//!
//! Servicio que admite jobs batch por HTTP y los ejecuta como procesos de un
//! runner externo (por defecto `spark2-submit`), persistiendo su ciclo de vida.
//!
//! ## Arquitectura
//!
//! - `http`: Parsing de requests y respuestas JSON sobre HTTP/1.0
//! - `router`: Enrutamiento de paths a handlers
//! - `server`: Loop de accept, un thread por conexión
//! - `jobs`: Colas, workers, monitor de completados y store de registros
//! - `metrics`: Contadores de requests y del pipeline
//! - `config`: CLI y variables de entorno
//! - `shutdown`: SIGINT/SIGTERM
//!
//! ## Ejemplo de uso
//!
//! ```no_run
//! use job_dispatch::config::Config;
//! use job_dispatch::jobs::{ArtifactStore, JobManager, JobManagerConfig, JobStore};
//! use job_dispatch::metrics::MetricsCollector;
//! use job_dispatch::server::Server;
//! use std::sync::Arc;
//!
//! # fn main() -> job_dispatch::error::Result<()> {
//! let config = Config::default();
//! let store = JobStore::open(config.store_path())?;
//! let manager = Arc::new(JobManager::start(
//!     JobManagerConfig::from_config(&config),
//!     store,
//!     MetricsCollector::new(),
//! )?);
//! let artifacts = ArtifactStore::new(config.job_files_dir())?;
//!
//! let server = Server::bind(&config, Arc::clone(&manager), artifacts)?;
//! server.run()?;
//! manager.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod jobs;
pub mod metrics;
pub mod router;
pub mod server;
pub mod shutdown;
