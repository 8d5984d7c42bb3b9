//! servicectl library
//!
//! Sends one console command to a running daemon and streams its progress
//! output to a writer.

#![allow(unused_crate_dependencies)]

pub mod error;

pub use error::{CliError, Result};

use ipc::ConsoleClient;
use schema::ClientConfig;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWrite;
use tracing::debug;

/// One console action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Include a group definition file
    Add(PathBuf),
    /// Remove a group
    Remove(String),
    /// Start a group or `all`
    Start(String),
    /// Stop a group or `all`
    Stop(String),
    /// Show status of a group or `all`
    List(String),
}

/// Resolve `path` against the current directory
pub fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(CliError::InvalidArgument("group file path is empty".to_string()));
    }
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Connect to the daemon announced in the temp dir and perform `action`
pub async fn run<W>(config: &ClientConfig, action: Action, out: W) -> Result<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut client = ConsoleClient::bootstrap(&config.temp_dir, out).await?;
    debug!("running {:?}", action);

    let result = match &action {
        Action::Add(path) => {
            let path = absolutize(path)?;
            let path = path.to_str().ok_or_else(|| {
                CliError::InvalidArgument(format!("{} is not valid UTF-8", path.display()))
            })?;
            client.add(path).await
        }
        Action::Remove(group) => client.remove(group).await,
        Action::Start(group) => client.start(group).await,
        Action::Stop(group) => client.stop(group).await,
        Action::List(group) => client.list(group).await,
    };

    // Flush pending progress output before reporting
    client.close().await?;
    result.map_err(CliError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolutize() {
        let abs = absolutize(Path::new("/etc/web.json")).unwrap();
        assert_eq!(abs, PathBuf::from("/etc/web.json"));

        let rel = absolutize(Path::new("web.json")).unwrap();
        assert!(rel.is_absolute());
        assert!(rel.ends_with("web.json"));

        assert!(absolutize(Path::new("")).is_err());
    }
}
