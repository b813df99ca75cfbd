//! # Job Dispatch - Entry Point
//! src/main.rs

use job_dispatch::config::Config;
use job_dispatch::error::Result;
use job_dispatch::jobs::{ArtifactStore, JobManager, JobManagerConfig, JobStore};
use job_dispatch::metrics::MetricsCollector;
use job_dispatch::server::Server;
use job_dispatch::shutdown;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::new();

    if let Err(e) = run(config) {
        tracing::error!(error = %e, "Fatal error");
        std::process::exit(1);
    }
}

fn run(config: Config) -> Result<()> {
    config.validate()?;
    config.log_summary();

    let store = JobStore::open(config.store_path())?;
    let artifacts = ArtifactStore::new(config.job_files_dir())?;
    let manager = Arc::new(JobManager::start(
        JobManagerConfig::from_config(&config),
        store,
        MetricsCollector::new(),
    )?);

    let server = Server::bind(&config, Arc::clone(&manager), artifacts)?;

    let stop = server.stop_handle();
    let _signals = shutdown::install_shutdown_handler(move || stop.stop())?;

    server.run()?;

    // Primero deja de aceptar conexiones, después drena el pipeline
    manager.shutdown();
    Ok(())
}
