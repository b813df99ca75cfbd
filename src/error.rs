//! # Errores del Servicio
//! src/error.rs
//!
//! Tipos de error compartidos por la cola, el storage, los workers y la capa HTTP.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Queue is closed")]
    QueueClosed,

    #[error("Failed to spawn runner '{runner}': {source}")]
    Spawn {
        runner: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Missing required artifact: {0}")]
    MissingArtifact(&'static str),

    #[error("Invalid artifact {path}: {reason}")]
    InvalidArtifact { path: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl DispatchError {
    /// Indica si el error es culpa del cliente (rechazo en la admisión)
    pub fn is_admission(&self) -> bool {
        matches!(
            self,
            DispatchError::MissingArtifact(_) | DispatchError::InvalidArtifact { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admission_classification() {
        assert!(DispatchError::MissingArtifact("py").is_admission());
        assert!(DispatchError::InvalidArtifact {
            path: "a.txt".to_string(),
            reason: "extension not allowed".to_string(),
        }
        .is_admission());
        assert!(!DispatchError::QueueClosed.is_admission());
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            DispatchError::MissingArtifact("py").to_string(),
            "Missing required artifact: py"
        );
        assert_eq!(DispatchError::QueueClosed.to_string(), "Queue is closed");
    }
}
