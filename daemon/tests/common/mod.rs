//! Test utilities for integration tests in the daemon crate.
#![allow(dead_code)]

use schema::DaemonConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Run the given future with a timeout, failing the test if it elapses.
pub async fn run_with_timeout<F, T>(duration: Duration, fut: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(duration, fut)
        .await
        .expect("test timed out")
}

/// Run a future with a default timeout of 60 seconds.
pub async fn run_with_default_timeout<F, T>(fut: F) -> T
where
    F: std::future::Future<Output = T>,
{
    run_with_timeout(Duration::from_secs(60), fut).await
}

/// Daemon config rooted in a scratch directory
pub fn config_in(dir: &Path) -> DaemonConfig {
    DaemonConfig {
        config_file: dir.join("serviced.json"),
        temp_dir: dir.to_path_buf(),
        log_level: "debug".to_string(),
        autostart: true,
    }
}

/// Write a group file whose services each sleep for a while
pub fn write_group(dir: &Path, name: &str, services: &[&str]) -> PathBuf {
    let services: Vec<_> = services
        .iter()
        .map(|service| {
            serde_json::json!({
                "name": service,
                "path": "/bin/sh",
                "args": ["sh", "-c", "exec sleep 30"],
                "env": ["PATH=/usr/bin:/bin"],
            })
        })
        .collect();
    let path = dir.join(format!("{}.json", name));
    let body = serde_json::json!({ "name": name, "services": services });
    std::fs::write(&path, body.to_string()).unwrap();
    path
}

/// Point the daemon config at the given group files
pub fn write_includes(dir: &Path, includes: &[(&Path, bool)]) {
    let map: serde_json::Map<String, serde_json::Value> = includes
        .iter()
        .map(|(path, enabled)| (path.display().to_string(), serde_json::Value::Bool(*enabled)))
        .collect();
    let body = serde_json::json!({ "includes": map });
    std::fs::write(dir.join("serviced.json"), body.to_string()).unwrap();
}
