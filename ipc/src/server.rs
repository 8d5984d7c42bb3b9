//! Control protocol server over local TCP
//!
//! Listens on `127.0.0.1`, one task per connection. Each request line is a
//! JSON array `[command, argument]`:
//! - `start <group|all>`
//! - `stop <group|all>`
//! - `add <group file>`
//! - `remove <group>`
//! - `list <group|all>`
//!
//! The reply is any number of progress lines followed by exactly one
//! `==OK:` or `==ERR:<message>` line. A request that cannot be decoded
//! closes the connection without a terminal line.

use crate::{read_line, write_line, IpcError, Result};
use async_trait::async_trait;
use schema::{terminal_line, Command, Group, RequestError, StatusRow, Target};
use serviced_core::Progress;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

/// Abstract control plane that the server delegates to
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Start the selected groups, reporting per-service progress
    async fn start(&self, target: &Target, progress: &Progress) -> serviced_core::Result<()>;

    /// Stop the selected groups, reporting per-service progress
    async fn stop(&self, target: &Target, progress: &Progress) -> serviced_core::Result<()>;

    /// Include the group defined in `path`
    async fn add(&self, path: &Path) -> serviced_core::Result<Group>;

    /// Forget a group
    async fn remove(&self, name: &str) -> serviced_core::Result<Group>;

    /// Status rows of the selected groups
    async fn list(&self, target: &Target) -> serviced_core::Result<Vec<StatusRow>>;
}

/// Run one command against `plane`, emitting its progress lines
pub async fn dispatch(
    plane: &dyn ControlPlane,
    command: &Command,
    progress: &Progress,
) -> serviced_core::Result<()> {
    match command {
        Command::Start(target) => {
            match target {
                Target::All => progress.line("all service is starting"),
                Target::Named(name) => progress.line(format!("{} service is starting", name)),
            }
            plane.start(target, progress).await
        }
        Command::Stop(target) => {
            match target {
                Target::All => progress.line("all service is stopping"),
                Target::Named(name) => progress.line(format!("{} service is stopping", name)),
            }
            plane.stop(target, progress).await
        }
        Command::Add(path) => match plane.add(Path::new(path)).await {
            Ok(group) => {
                progress.line(format!(
                    "add group {} success with {} service",
                    group.name,
                    group.services.len()
                ));
                Ok(())
            }
            Err(e) => {
                progress.line(format!("add group {} fail with {}", path, e));
                Err(e)
            }
        },
        Command::Remove(name) => match plane.remove(name).await {
            Ok(group) => {
                progress.line(format!(
                    "remove group {} success with {} service",
                    group.name,
                    group.services.len()
                ));
                Ok(())
            }
            Err(e) => {
                progress.line(format!("remove group {} fail with {}", name, e));
                Err(e)
            }
        },
        Command::List(target) => {
            let rows = plane.list(target).await?;
            progress.line(StatusRow::header());
            for row in rows {
                progress.line(row.to_line());
            }
            Ok(())
        }
    }
}

/// Control protocol listener
#[allow(missing_debug_implementations)]
pub struct ControlServer {
    listener: TcpListener,
    plane: Arc<dyn ControlPlane>,
}

impl ControlServer {
    /// Bind an ephemeral port on the loopback interface
    pub async fn bind(plane: Arc<dyn ControlPlane>) -> Result<Self> {
        Self::bind_to("127.0.0.1:0", plane).await
    }

    /// Bind a specific address
    pub async fn bind_to(addr: &str, plane: Arc<dyn ControlPlane>) -> Result<Self> {
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            IpcError::ConnectionFailed(format!("Failed to bind {}: {}", addr, e))
        })?;
        Ok(Self { listener, plane })
    }

    /// Address the server is listening on
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| IpcError::ConnectionFailed(e.to_string()))
    }

    /// Write the listening address to the discovery file in `temp_dir`
    pub async fn publish(&self, temp_dir: &Path) -> Result<PathBuf> {
        let addr = self.local_addr()?;
        let path = crate::write_discovery(temp_dir, addr).await?;
        info!("starting console on {}, save to {}", addr, path.display());
        Ok(path)
    }

    /// Accept connections until the task is dropped
    pub async fn serve(self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    debug!("console connection from {}", peer);
                    let plane = Arc::clone(&self.plane);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, plane).await {
                            warn!("console connection {} error: {}", peer, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept console connection: {}", e);
                }
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, plane: Arc<dyn ControlPlane>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    while let Some(frame) = read_line(&mut reader).await? {
        let command = match Command::parse_line(&frame) {
            Ok(command) => command,
            Err(RequestError::UnknownCommand(name)) => {
                warn!("unknown console command {}", name);
                let outcome: std::result::Result<(), RequestError> =
                    Err(RequestError::UnknownCommand(name));
                write_line(&mut writer, &terminal_line(&outcome)).await?;
                continue;
            }
            Err(e) => {
                warn!(
                    "parse client command fail with {} by {}",
                    e,
                    String::from_utf8_lossy(&frame)
                );
                break;
            }
        };

        debug!("console command {}", command.to_line());
        let (progress, mut lines) = Progress::channel();
        let task_plane = Arc::clone(&plane);
        // Detached so a disconnect never interrupts a half-done command
        let mut task = tokio::spawn(async move {
            dispatch(task_plane.as_ref(), &command, &progress).await
        });

        let joined = loop {
            tokio::select! {
                Some(line) = lines.recv() => write_line(&mut writer, &line).await?,
                joined = &mut task => break joined,
            }
        };
        while let Some(line) = lines.recv().await {
            write_line(&mut writer, &line).await?;
        }

        let outcome = match joined {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(e) => Err(format!("command aborted: {}", e)),
        };
        write_line(&mut writer, &terminal_line(&outcome)).await?;
    }
    Ok(())
}

/// [`ControlPlane`] backed by a [`serviced_core::Supervisor`]
pub mod supervisor_adapter {
    use super::ControlPlane;
    use async_trait::async_trait;
    use schema::{Group, StatusRow, Target};
    use serviced_core::{Progress, Result, Supervisor};
    use std::path::Path;

    /// Control plane adapter driving a supervisor and its group store
    #[derive(Debug, Clone)]
    pub struct SupervisorControlPlane {
        supervisor: Supervisor,
    }

    impl SupervisorControlPlane {
        /// Wrap a supervisor
        pub fn new(supervisor: Supervisor) -> Self {
            Self { supervisor }
        }
    }

    #[async_trait]
    impl ControlPlane for SupervisorControlPlane {
        async fn start(&self, target: &Target, progress: &Progress) -> Result<()> {
            self.supervisor.start(target, progress).await
        }

        async fn stop(&self, target: &Target, progress: &Progress) -> Result<()> {
            self.supervisor.stop_group(target, progress).await
        }

        async fn add(&self, path: &Path) -> Result<Group> {
            self.supervisor.store().add(path, true).await
        }

        async fn remove(&self, name: &str) -> Result<Group> {
            self.supervisor.store().remove(name).await
        }

        async fn list(&self, target: &Target) -> Result<Vec<StatusRow>> {
            Ok(self.supervisor.status(target).await)
        }
    }
}
