//! # Módulo del Servidor HTTP
//! src/server/mod.rs
//!
//! Servidor TCP de la API:
//! 1. Escucha en host:port
//! 2. Acepta conexiones hasta que se pide parar
//! 3. Lee y parsea cada request en su propio thread
//! 4. Despacha al router y envía la respuesta

pub mod tcp;

pub use tcp::{Server, StopHandle};
