//! Daemon bootstrap: load groups, start the control server, autostart
//!
//! `bootstrap` loads the group store, binds the control server on an
//! ephemeral loopback port, publishes its address in the discovery file
//! and starts every enabled group. The returned handle stops all services
//! and the server on shutdown.

use ipc::server::supervisor_adapter::SupervisorControlPlane;
use ipc::ControlServer;
use schema::DaemonConfig;
use serviced_core::{utils, FileGroupStore, GroupStore, Progress, Supervisor};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::Result;

/// Handle to manage the running components
#[derive(Debug)]
pub struct BootstrapHandle {
    /// Control server address
    pub addr: SocketAddr,
    /// Discovery file holding `addr`
    pub discovery_file: PathBuf,
    supervisor: Supervisor,
    server_task: Option<JoinHandle<ipc::Result<()>>>,
}

impl BootstrapHandle {
    /// Supervisor owning every service process
    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// Stop every service, then the control server
    pub async fn shutdown(mut self) {
        info!("stopping all service");
        if let Err(e) = self.supervisor.stop_all(&Progress::discard()).await {
            warn!("stop all service fail with {}", e);
        }
        if let Some(task) = self.server_task.take() {
            task.abort();
            let _ = task.await;
        }
        info!("console on {} is stopped", self.addr);
    }
}

/// Bring the daemon up from `config`
pub async fn bootstrap(config: &DaemonConfig) -> Result<BootstrapHandle> {
    utils::validate_config(config)?;
    info!(
        "bootstrap all service by config {}",
        config.config_file.display()
    );

    let store = Arc::new(FileGroupStore::new(&config.config_file));
    if let Err(e) = store.load().await {
        error!(
            "load configure from {} fail with {}",
            config.config_file.display(),
            e
        );
        return Err(e.into());
    }

    let supervisor = Supervisor::new(store);
    let plane = Arc::new(SupervisorControlPlane::new(supervisor.clone()));
    let server = ControlServer::bind(plane).await.map_err(|e| {
        error!("start console listen fail with {}", e);
        e
    })?;
    let addr = server.local_addr()?;
    let discovery_file = server.publish(&config.temp_dir).await?;
    let server_task = tokio::spawn(server.serve());

    if config.autostart {
        if let Err(e) = supervisor.start_enabled(&Progress::discard()).await {
            warn!("autostart fail with {}", e);
        }
    }

    Ok(BootstrapHandle {
        addr,
        discovery_file,
        supervisor,
        server_task: Some(server_task),
    })
}
