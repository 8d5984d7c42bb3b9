//! Core functionality for serviced
//!
//! This crate contains the business logic shared by the daemon and the
//! console: the group store, token substitution, process spawning and the
//! supervisor that owns every live service process.

pub mod error;
pub mod process;
pub mod store;
pub mod subst;
pub mod supervisor;


// Re-export schema types for convenience
pub use schema::*;

pub use error::{CoreError, Result};
pub use store::{FileGroupStore, GroupStore};
pub use supervisor::{Progress, Supervisor};

/// Core utilities and helper functions
pub mod utils {
    use tracing::{debug, info};

    /// Initialize tracing for the application
    pub fn init_tracing(level: &str) -> crate::Result<()> {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

        fmt()
            .with_env_filter(filter)
            .try_init()
            .map_err(|e| crate::CoreError::InitializationError(e.to_string()))?;

        info!("Tracing initialized with level: {}", level);
        Ok(())
    }

    /// Validate configuration values
    pub fn validate_config(config: &crate::DaemonConfig) -> crate::Result<()> {
        if config.config_file.as_os_str().is_empty() {
            return Err(crate::CoreError::ConfigurationError(
                "Config file cannot be empty".to_string(),
            ));
        }

        if config.temp_dir.as_os_str().is_empty() {
            return Err(crate::CoreError::ConfigurationError(
                "Temp dir cannot be empty".to_string(),
            ));
        }

        if config.log_level.trim().is_empty() {
            return Err(crate::CoreError::ConfigurationError(
                "Log level cannot be empty".to_string(),
            ));
        }

        debug!("Configuration validated successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_validate_config() {
        let mut config = DaemonConfig::default();
        assert!(utils::validate_config(&config).is_ok());

        config.config_file = PathBuf::new();
        assert!(utils::validate_config(&config).is_err());

        config.config_file = PathBuf::from("serviced.json");
        config.temp_dir = PathBuf::new();
        assert!(utils::validate_config(&config).is_err());

        config.temp_dir = std::env::temp_dir();
        config.log_level = " ".to_string();
        assert!(utils::validate_config(&config).is_err());
    }
}
