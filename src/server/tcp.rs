//! # Servidor TCP Concurrente
//! src/server/tcp.rs
//!
//! Un thread por conexión, un request por conexión. El loop de accept es no
//! bloqueante para poder observar la bandera de parada entre conexiones.

use crate::config::Config;
use crate::error::Result;
use crate::http::request::{content_length, find_header_end};
use crate::http::{ParseError, Request, Response, StatusCode};
use crate::jobs::handlers::{self, JOB_PATH_PREFIX};
use crate::jobs::{ArtifactStore, JobManager};
use crate::metrics::MetricsCollector;
use crate::router::Router;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Pausa entre intentos de accept cuando no hay conexiones pendientes
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Tiempo máximo esperando bytes del cliente
const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Tamaño máximo aceptado para un request completo
const MAX_REQUEST_BYTES: usize = 64 * 1024;

/// Cuánto se descarta de un request rechazado antes de cerrar
const DRAIN_LIMIT: u64 = 1024 * 1024;
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Resultado de leer un request del socket
enum RawRequest {
    /// El cliente cerró sin mandar nada
    Empty,
    Complete(Vec<u8>),
    /// Headers o `Content-Length` por encima de `MAX_REQUEST_BYTES`
    TooLarge,
}

/// Servidor HTTP/1.0 de la API
pub struct Server {
    listener: TcpListener,
    router: Arc<Router>,
    metrics: MetricsCollector,
    stop: StopHandle,
}

/// Permite detener el loop de accept desde otro thread
#[derive(Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl Server {
    /// Hace bind en `config.address()` y arma las rutas
    pub fn bind(config: &Config, manager: Arc<JobManager>, artifacts: ArtifactStore) -> Result<Self> {
        let listener = TcpListener::bind(config.address())?;
        listener.set_nonblocking(true)?;

        let metrics = manager.metrics().clone();

        Ok(Self {
            listener,
            router: Arc::new(build_router(manager, artifacts)),
            metrics,
            stop: StopHandle::default(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Atiende conexiones hasta que se llame `StopHandle::stop`
    pub fn run(&self) -> Result<()> {
        tracing::info!(address = %self.local_addr()?, "Server listening");

        while !self.stop.is_stopped() {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    let router = Arc::clone(&self.router);
                    let metrics = self.metrics.clone();

                    let spawned = thread::Builder::new()
                        .name("http-conn".to_string())
                        .spawn(move || {
                            if let Err(e) = handle_connection(stream, &router, &metrics) {
                                tracing::warn!(peer = %peer, error = %e, "Connection error");
                            }
                        });
                    if let Err(e) = spawned {
                        tracing::error!(peer = %peer, error = %e, "Failed to spawn connection thread");
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to accept connection");
                }
            }
        }

        tracing::info!("Server stopped accepting connections");
        Ok(())
    }
}

/// Rutas de la API. GET y POST se aceptan en todas.
fn build_router(manager: Arc<JobManager>, artifacts: ArtifactStore) -> Router {
    let mut router = Router::new();

    let m = Arc::clone(&manager);
    router.register("/submit", move |req: &Request| {
        handlers::submit_handler(req, &m, &artifacts)
    });

    let m = Arc::clone(&manager);
    router.register("/jobs", move |req: &Request| handlers::list_handler(req, &m));

    let m = Arc::clone(&manager);
    router.register_prefix(JOB_PATH_PREFIX, move |req: &Request| {
        handlers::job_handler(req, &m)
    });

    router.register("/metrics", move |_req: &Request| {
        Response::json(&manager.metrics().to_json(manager.gauges()))
    });

    router
}

/// Lee un request, lo despacha y escribe la respuesta
fn handle_connection(mut stream: TcpStream, router: &Router, metrics: &MetricsCollector) -> io::Result<()> {
    let start = Instant::now();
    let request_id = Uuid::new_v4().to_string();

    // Algunas plataformas heredan el modo no bloqueante del listener
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(READ_TIMEOUT))?;

    let raw = read_request(&mut stream)?;
    let too_large = matches!(raw, RawRequest::TooLarge);
    let parsed = match raw {
        RawRequest::Empty => {
            tracing::debug!(request_id = %request_id, "Connection closed without data");
            return Ok(());
        }
        RawRequest::TooLarge => Err(ParseError::TooLarge(MAX_REQUEST_BYTES)),
        RawRequest::Complete(raw) => Request::parse(&raw),
    };

    let (mut response, path) = match parsed {
        Ok(request) => {
            tracing::debug!(
                request_id = %request_id,
                method = request.method().as_str(),
                path = request.path(),
                "Request received"
            );
            (router.route(&request), request.path().to_string())
        }
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Malformed request");
            let response = Response::error(StatusCode::BadRequest, &format!("Invalid request: {}", e))
                .with_header("Connection", "close");
            (response, "/invalid".to_string())
        }
    };

    response.add_header("X-Request-Id", &request_id);

    stream.write_all(&response.to_bytes())?;
    stream.flush()?;

    if too_large {
        drain(&mut stream);
    }

    let latency = start.elapsed();
    let status = response.status();
    metrics.record_request(&path, status.as_u16(), latency);

    let latency_ms = latency.as_secs_f64() * 1000.0;
    if status.is_server_error() {
        tracing::error!(request_id = %request_id, path = %path, status = status.as_u16(), latency_ms, "Request failed");
    } else if status.is_client_error() {
        tracing::warn!(request_id = %request_id, path = %path, status = status.as_u16(), latency_ms, "Request rejected");
    } else {
        tracing::info!(request_id = %request_id, path = %path, status = status.as_u16(), latency_ms, "Request handled");
    }

    Ok(())
}

/// Descarta lo que quede del request antes de cerrar. Cerrar con bytes sin
/// leer hace que el kernel mande RST y el cliente pierda la respuesta.
fn drain(stream: &mut TcpStream) {
    let _ = stream.shutdown(Shutdown::Write);
    if stream.set_read_timeout(Some(DRAIN_TIMEOUT)).is_ok() {
        let _ = io::copy(&mut stream.take(DRAIN_LIMIT), &mut io::sink());
    }
}

/// Lee hasta el fin de headers más `Content-Length` bytes de body.
///
/// Nunca acumula más de `MAX_REQUEST_BYTES`: si los headers no terminan antes
/// o el `Content-Length` declarado no entra, el request es `TooLarge`.
fn read_request(stream: &mut TcpStream) -> io::Result<RawRequest> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];
    let mut expected: Option<usize> = None;

    loop {
        match expected {
            Some(total) if buffer.len() >= total => break,
            None if buffer.len() >= MAX_REQUEST_BYTES => return Ok(RawRequest::TooLarge),
            _ => {}
        }

        let read = stream.read(&mut chunk)?;
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);

        if expected.is_none() {
            if let Some(end) = find_header_end(&buffer) {
                // Un Content-Length inválido lo reporta `Request::parse`
                let declared = match content_length(&buffer[..end]) {
                    Ok(declared) => declared,
                    Err(_) => break,
                };
                match (end + 4).checked_add(declared) {
                    Some(total) if total <= MAX_REQUEST_BYTES => expected = Some(total),
                    _ => return Ok(RawRequest::TooLarge),
                }
            }
        }
    }

    if buffer.is_empty() {
        Ok(RawRequest::Empty)
    } else {
        Ok(RawRequest::Complete(buffer))
    }
}
