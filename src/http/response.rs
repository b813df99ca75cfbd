//! # Construcción de Respuestas HTTP
//! src/http/response.rs
//!
//! ```text
//! HTTP/1.0 200 OK\r\n
//! Content-Type: application/json\r\n
//! Content-Length: 61\r\n
//! X-Request-Id: 5f0c...\r\n
//! \r\n
//! {"job_id":"5f0c...","name":"pi computer","status":"running"}
//! ```
//!
//! Todas las respuestas del servicio son JSON; los bodies se serializan con
//! `serde_json` a partir de los tipos de respuesta.

use super::StatusCode;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,

    /// Ordenados para que la salida sea estable
    headers: BTreeMap<String, String>,

    body: Vec<u8>,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.add_header(name, value);
        self
    }

    /// Si el header ya existe, se sobrescribe
    pub fn add_header(&mut self, name: &str, value: &str) {
        self.headers.insert(name.to_string(), value.to_string());
    }

    pub fn with_body_bytes(mut self, body: Vec<u8>) -> Self {
        self.headers
            .insert("Content-Length".to_string(), body.len().to_string());
        self.body = body;
        self
    }

    /// Respuesta JSON con el status indicado
    ///
    /// ```
    /// use job_dispatch::http::{Response, StatusCode};
    ///
    /// let response = Response::json_with_status(StatusCode::Ok, &serde_json::json!({}));
    /// assert_eq!(response.body(), b"{}");
    /// ```
    pub fn json_with_status<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self::new(status)
                .with_header("Content-Type", "application/json")
                .with_body_bytes(body),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize response body");
                Self::error(StatusCode::InternalServerError, "serialization failed")
            }
        }
    }

    /// 200 OK con body JSON
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Self {
        Self::json_with_status(StatusCode::Ok, value)
    }

    /// `{"error": "<mensaje>"}`
    pub fn error(status: StatusCode, message: &str) -> Self {
        let body = serde_json::json!({ "error": message }).to_string();
        Self::new(status)
            .with_header("Content-Type", "application/json")
            .with_body_bytes(body.into_bytes())
    }

    /// Status line, headers, línea vacía y body
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut result = format!("HTTP/1.0 {}\r\n", self.status).into_bytes();

        for (name, value) in &self.headers {
            result.extend_from_slice(format!("{}: {}\r\n", name, value).as_bytes());
        }

        result.extend_from_slice(b"\r\n");
        result.extend_from_slice(&self.body);
        result
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(|s| s.as_str())
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}
