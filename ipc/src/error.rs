//! IPC error types and utilities

use thiserror::Error;

/// IPC-specific error types
#[derive(Error, Debug)]
pub enum IpcError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Failed to send message: {0}")]
    SendFailed(String),

    #[error("Failed to receive response: {0}")]
    ReceiveFailed(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// Failure reported by the daemon through an `==ERR:` line
    #[error("{0}")]
    Remote(String),

    #[error("Connection closed before the response completed")]
    ConnectionClosed,

    #[error("Discovery failed: {0}")]
    DiscoveryFailed(String),
}

impl IpcError {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            IpcError::ConnectionFailed(_) => "IPC001",
            IpcError::SendFailed(_) => "IPC002",
            IpcError::ReceiveFailed(_) => "IPC003",
            IpcError::ProtocolError(_) => "IPC004",
            IpcError::Remote(_) => "IPC005",
            IpcError::ConnectionClosed => "IPC006",
            IpcError::DiscoveryFailed(_) => "IPC007",
        }
    }
}

/// IPC-specific result type
pub type Result<T> = std::result::Result<T, IpcError>;
