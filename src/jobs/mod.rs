//! # Sistema de Jobs
//! src/jobs/mod.rs
//!
//! Pipeline de despacho:
//!
//! ```text
//! API ──► cola de jobs ──► workers ──► cola de completados ──► monitor ──► store
//!  ▲                                                                         │
//!  └──────────────────────────── lecturas ◄─────────────────────────────────┘
//! ```
//!
//! ## Endpoints
//!
//! - `/submit?py=PATH&name=...` - Admitir un job
//! - `/jobs` - Últimos jobs
//! - `/job/<id>` - Estado de un job

pub mod artifacts;
pub mod handlers;
pub mod manager;
pub mod monitor;
pub mod queue;
pub mod slots;
pub mod storage;
pub mod types;
pub mod worker;

pub use artifacts::ArtifactStore;
pub use manager::{JobManager, JobManagerConfig};
pub use storage::JobStore;
pub use types::{JobRecord, JobSpec, JobStatus, SubmitParams, SubmitResponse};
