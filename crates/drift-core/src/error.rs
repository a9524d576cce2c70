//! Error types for DRIFT

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Core DRIFT errors
#[derive(Error, Debug)]
pub enum DriftError {
    // Startup errors
    #[error("Address already in use: {0}")]
    AddressInUse(SocketAddr),

    #[error("Failed to bind {addr}: {reason}")]
    Bind { addr: SocketAddr, reason: String },

    #[error("Failed to open log {path:?}: {reason}")]
    LogOpen { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Network errors
    #[error("Connection to {0} failed")]
    ConnectFailed(SocketAddr),

    #[error("Transport error: {0}")]
    Transport(String),

    // Wire errors
    #[error("Invalid message: {0}")]
    Decode(String),

    #[error("Failed to encode message: {0}")]
    Encode(String),

    // Log errors
    #[error("Log write failed: {0}")]
    Log(String),

    #[error("Malformed log line: {0}")]
    MalformedLogLine(String),

    // Lifecycle errors
    #[error("Node {0} task failed: {1}")]
    NodeFailed(u64, String),
}

impl DriftError {
    /// Fatal errors stop the node; everything else is logged and dropped
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            DriftError::ConnectFailed(_)
                | DriftError::Transport(_)
                | DriftError::Decode(_)
                | DriftError::Encode(_)
        )
    }
}

/// Result type for DRIFT operations
pub type DriftResult<T> = Result<T, DriftError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let addr: SocketAddr = "127.0.0.1:6000".parse().unwrap();
        assert!(DriftError::AddressInUse(addr).is_fatal());
        assert!(DriftError::Log("disk full".into()).is_fatal());
        assert!(!DriftError::ConnectFailed(addr).is_fatal());
        assert!(!DriftError::Decode("eof".into()).is_fatal());
    }

    #[test]
    fn test_error_display() {
        let addr: SocketAddr = "127.0.0.1:6001".parse().unwrap();
        assert_eq!(
            DriftError::AddressInUse(addr).to_string(),
            "Address already in use: 127.0.0.1:6001"
        );
    }
}
