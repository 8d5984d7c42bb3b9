//! serviced daemon binary
//!
//! Loads the group configuration, publishes the control address and keeps
//! the configured services running until a termination signal arrives.

#![allow(unused_crate_dependencies)]

use clap::Parser;
use daemon::DaemonError;
use schema::DaemonConfig;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "serviced")]
#[command(about = "Supervise groups of service processes")]
#[command(version)]
struct Args {
    /// Daemon config file listing included group files
    #[arg(long, env = "SERVICED_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory receiving the console discovery file
    #[arg(long, env = "SERVICED_TEMP_DIR", value_name = "DIR")]
    temp_dir: Option<PathBuf>,

    /// Log level (RUST_LOG takes precedence)
    #[arg(long, env = "SERVICED_LOG", default_value = "info")]
    log_level: String,

    /// Do not start enabled groups on boot
    #[arg(long)]
    no_autostart: bool,
}

impl Args {
    fn into_config(self) -> daemon::Result<DaemonConfig> {
        let defaults = DaemonConfig::default();
        let config_file = match self.config {
            Some(path) => path,
            None => default_config_file()?,
        };
        Ok(DaemonConfig {
            config_file,
            temp_dir: self.temp_dir.unwrap_or(defaults.temp_dir),
            log_level: self.log_level,
            autostart: !self.no_autostart,
        })
    }
}

/// `serviced.json` next to the running executable
fn default_config_file() -> daemon::Result<PathBuf> {
    let exe = std::env::current_exe()?;
    let dir = exe.parent().ok_or_else(|| {
        DaemonError::ConfigError(format!("executable {} has no directory", exe.display()))
    })?;
    Ok(dir.join(DaemonConfig::default().config_file))
}

#[cfg(unix)]
async fn wait_for_signal() -> daemon::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;
    let mut quit = signal(SignalKind::quit())?;
    tokio::select! {
        r = tokio::signal::ctrl_c() => r?,
        _ = terminate.recv() => {},
        _ = hangup.recv() => {},
        _ = quit.recv() => {},
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> daemon::Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> daemon::Result<()> {
    let config = Args::parse().into_config()?;
    serviced_core::utils::init_tracing(&config.log_level)?;

    info!("Starting serviced");
    let handle = match daemon::bootstrap(&config).await {
        Ok(handle) => handle,
        Err(e) => {
            error!("bootstrap fail with {}", e);
            return Err(e);
        }
    };

    if let Err(e) = wait_for_signal().await {
        error!("waiting for signals fail with {}", e);
        handle.shutdown().await;
        return Err(DaemonError::ServerError(e.to_string()));
    }

    info!("Received shutdown signal, shutting down...");
    handle.shutdown().await;
    info!("serviced stopped");
    Ok(())
}
