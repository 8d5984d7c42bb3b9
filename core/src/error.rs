//! Core error types and utilities

use thiserror::Error;

/// Core-specific error types
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("{0} is running")]
    AlreadyRunning(String),

    #[error("{0} is not running")]
    NotRunning(String),

    #[error("group {0} is not exist")]
    GroupNotFound(String),

    #[error("Spawn failed: {0}")]
    SpawnFailure(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("some service {action} fail")]
    PartialGroupFailure {
        /// Which operation partially failed (`start` or `stop`)
        action: &'static str,
    },

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Initialization error: {0}")]
    InitializationError(String),

    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Generic error: {0}")]
    Other(String),
}

impl CoreError {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::ConfigurationError(_) => "CORE001",
            CoreError::ValidationError(_) => "CORE002",
            CoreError::InitializationError(_) => "CORE003",
            CoreError::ServiceError(_) => "CORE004",
            CoreError::IoError(_) => "CORE005",
            CoreError::SerializationError(_) => "CORE006",
            CoreError::AlreadyRunning(_) => "CORE010",
            CoreError::NotRunning(_) => "CORE011",
            CoreError::GroupNotFound(_) => "CORE012",
            CoreError::SpawnFailure(_) => "CORE013",
            CoreError::PartialGroupFailure { .. } => "CORE014",
            CoreError::Other(_) => "CORE999",
        }
    }
}

/// Core-specific result type
pub type Result<T> = std::result::Result<T, CoreError>;

// Convenience implementations
impl From<&str> for CoreError {
    fn from(s: &str) -> Self {
        CoreError::Other(s.to_string())
    }
}

impl From<String> for CoreError {
    fn from(s: String) -> Self {
        CoreError::Other(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(CoreError::ConfigurationError("test".to_string()).code(), "CORE001");
        assert_eq!(CoreError::ValidationError("test".to_string()).code(), "CORE002");
        assert_eq!(CoreError::AlreadyRunning("g/s".to_string()).code(), "CORE010");
        assert_eq!(CoreError::NotRunning("g/s".to_string()).code(), "CORE011");
        assert_eq!(CoreError::GroupNotFound("g".to_string()).code(), "CORE012");
        assert_eq!(CoreError::SpawnFailure("test".to_string()).code(), "CORE013");
        assert_eq!(CoreError::PartialGroupFailure { action: "start" }.code(), "CORE014");
        assert_eq!(CoreError::Other("test".to_string()).code(), "CORE999");
    }

    #[test]
    fn test_error_display() {
        let error = CoreError::AlreadyRunning("web/api".to_string());
        assert_eq!(error.to_string(), "web/api is running");
        let error = CoreError::PartialGroupFailure { action: "start" };
        assert_eq!(error.to_string(), "some service start fail");
    }
}
