//! # Módulo HTTP
//! src/http/mod.rs
//!
//! HTTP/1.0 mínimo para la API del servicio:
//!
//! - Parsing de requests (request line, headers, body urlencoded)
//! - Respuestas JSON
//! - Status codes usados por los handlers
//!
//! Una conexión atiende un solo request y se cierra (sin keep-alive).

pub mod request;
pub mod response;
pub mod status;

pub use request::{Method, ParseError, Request};
pub use response::Response;
pub use status::StatusCode;
