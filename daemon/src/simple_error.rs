//! Simple daemon error types

#[derive(Debug)]
pub enum DaemonError {
    ConfigError(String),
    ServerError(String),
    Core(serviced_core::CoreError),
    Ipc(ipc::IpcError),
    IoError(std::io::Error),
}

impl std::fmt::Display for DaemonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DaemonError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            DaemonError::ServerError(msg) => write!(f, "Server error: {}", msg),
            DaemonError::Core(err) => write!(f, "{}", err),
            DaemonError::Ipc(err) => write!(f, "{}", err),
            DaemonError::IoError(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for DaemonError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DaemonError::Core(err) => Some(err),
            DaemonError::Ipc(err) => Some(err),
            DaemonError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DaemonError {
    fn from(err: std::io::Error) -> Self {
        DaemonError::IoError(err)
    }
}

impl From<serviced_core::CoreError> for DaemonError {
    fn from(err: serviced_core::CoreError) -> Self {
        DaemonError::Core(err)
    }
}

impl From<ipc::IpcError> for DaemonError {
    fn from(err: ipc::IpcError) -> Self {
        DaemonError::Ipc(err)
    }
}

pub type Result<T> = std::result::Result<T, DaemonError>;
