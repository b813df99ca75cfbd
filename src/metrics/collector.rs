//! # Collector de Métricas
//! src/metrics/collector.rs
//!
//! Recolecta métricas del servidor HTTP y del pipeline de jobs en tiempo real.

use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Máximo de latencias a guardar para calcular percentiles
const MAX_LATENCY_SAMPLES: usize = 10_000;

/// Collector de métricas thread-safe
#[derive(Clone)]
pub struct MetricsCollector {
    inner: Arc<Mutex<MetricsData>>,
    start_time: Instant,
}

/// Datos internos de métricas
#[derive(Default)]
struct MetricsData {
    /// Contador total de requests
    total_requests: u64,

    /// Requests por código de estado
    status_codes: HashMap<u16, u64>,

    /// Últimas latencias registradas (en microsegundos)
    latencies: VecDeque<u64>,

    /// Requests por ruta
    requests_per_path: HashMap<String, u64>,

    /// Contadores del ciclo de vida de jobs
    jobs: JobCounters,
}

/// Contadores acumulados de jobs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobCounters {
    pub submitted: u64,
    pub rejected: u64,
    pub finished: u64,
    pub failed: u64,
    pub spawn_failures: u64,
}

/// Valores instantáneos que reporta el servicio al armar `/metrics`
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PipelineGauges {
    pub queued: usize,
    pub queue_capacity: usize,
    pub running: usize,
    pub max_running: usize,
    pub stored_records: usize,
}

impl MetricsCollector {
    /// Crea un nuevo collector de métricas
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MetricsData::default())),
            start_time: Instant::now(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MetricsData> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registra un request atendido
    pub fn record_request(&self, path: &str, status_code: u16, latency: Duration) {
        let mut data = self.lock();

        data.total_requests += 1;
        *data.status_codes.entry(status_code).or_insert(0) += 1;

        if data.latencies.len() >= MAX_LATENCY_SAMPLES {
            data.latencies.pop_front();
        }
        data.latencies.push_back(latency.as_micros() as u64);

        *data.requests_per_path.entry(Self::path_label(path)).or_insert(0) += 1;
    }

    /// `/job/<id>` se agrupa en una sola entrada
    fn path_label(path: &str) -> String {
        if path.starts_with("/job/") {
            "/job/:id".to_string()
        } else {
            path.to_string()
        }
    }

    pub fn record_submitted(&self) {
        self.lock().jobs.submitted += 1;
    }

    pub fn record_rejected(&self) {
        self.lock().jobs.rejected += 1;
    }

    pub fn record_finished(&self) {
        self.lock().jobs.finished += 1;
    }

    pub fn record_failed(&self) {
        self.lock().jobs.failed += 1;
    }

    /// Un fallo de spawn también cuenta como job fallido
    pub fn record_spawn_failure(&self) {
        let mut data = self.lock();
        data.jobs.spawn_failures += 1;
        data.jobs.failed += 1;
    }

    pub fn job_counters(&self) -> JobCounters {
        self.lock().jobs
    }

    /// Métricas actuales en formato JSON
    pub fn to_json(&self, gauges: PipelineGauges) -> serde_json::Value {
        let data = self.lock();
        let latencies: Vec<u64> = data.latencies.iter().copied().collect();
        let (p50, p95, p99, avg) = calculate_percentiles(&latencies);

        let mut paths: Vec<_> = data.requests_per_path.iter().collect();
        paths.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        let top_paths: Vec<_> = paths
            .iter()
            .take(10)
            .map(|(path, count)| serde_json::json!({ "path": path, "count": count }))
            .collect();

        let status_codes: HashMap<String, u64> = data
            .status_codes
            .iter()
            .map(|(code, count)| (code.to_string(), *count))
            .collect();

        serde_json::json!({
            "server": {
                "uptime_seconds": self.start_time.elapsed().as_secs(),
            },
            "requests": {
                "total": data.total_requests,
                "status_codes": status_codes,
                "top_paths": top_paths,
            },
            "latency_us": {
                "p50": p50,
                "p95": p95,
                "p99": p99,
                "avg": avg,
                "samples": latencies.len(),
            },
            "jobs": data.jobs,
            "pipeline": gauges,
        })
    }

    /// Obtiene un snapshot de las métricas
    pub fn snapshot(&self) -> MetricsSnapshot {
        let data = self.lock();
        let latencies: Vec<u64> = data.latencies.iter().copied().collect();
        let (p50, p95, p99, avg) = calculate_percentiles(&latencies);

        MetricsSnapshot {
            total_requests: data.total_requests,
            uptime_secs: self.start_time.elapsed().as_secs(),
            latency_p50_us: p50,
            latency_p95_us: p95,
            latency_p99_us: p99,
            latency_avg_us: avg,
            jobs: data.jobs,
        }
    }
}

/// Calcula percentiles de latencia: (p50, p95, p99, promedio)
fn calculate_percentiles(latencies: &[u64]) -> (u64, u64, u64, u64) {
    if latencies.is_empty() {
        return (0, 0, 0, 0);
    }

    let mut sorted = latencies.to_vec();
    sorted.sort_unstable();

    let len = sorted.len();
    let p50 = sorted[len * 50 / 100];
    let p95 = sorted[len * 95 / 100];
    let p99 = sorted[len * 99 / 100];
    let avg = sorted.iter().sum::<u64>() / len as u64;

    (p50, p95, p99, avg)
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot de métricas (para uso externo)
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub uptime_secs: u64,
    pub latency_p50_us: u64,
    pub latency_p95_us: u64,
    pub latency_p99_us: u64,
    pub latency_avg_us: u64,
    pub jobs: JobCounters,
}
