//! # Sistema de Métricas
//! src/metrics/mod.rs
//!
//! Recolección de métricas del servicio:
//! - Contadores y latencias de requests HTTP
//! - Contadores del ciclo de vida de jobs
//! - Ocupación de la cola y de los slots de ejecución

pub mod collector;

pub use collector::{JobCounters, MetricsCollector, PipelineGauges};
