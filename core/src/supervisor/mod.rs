//! Service supervisor implementation
//!
//! The supervisor owns every live service process. Each started process
//! gets an exit-wait task that exclusively owns the child handle:
//!
//! ```text
//! start_service ──spawn──▶ Registry[g/s] = Running ──▶ exit-wait task
//!                                                        │
//! stop_service ──kill channel──▶ SIGKILL process group ──┤
//!                                                        ▼
//!                          Registry.remove(g/s), publish Stopped
//! ```
//!
//! The state machine is `Stopped → Running → Stopped`; exited services are
//! never restarted.
//!
//! ## Components
//!
//! - [`Supervisor`]: start/stop/status entry points
//! - [`Progress`]: sink for per-service progress lines of bulk operations
//! - [`LaunchPlan`]: token and path resolution of a service definition

use crate::process::{self, ChildProcess};
use crate::store::GroupStore;
use crate::{CoreError, Result};
use schema::{Group, RunState, Service, StatusRow, Target};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

pub mod launch;
pub mod progress;
pub mod registry;


pub use launch::{working_dir, LaunchPlan, LogFiles};
pub use progress::Progress;
pub use registry::{Lifecycle, ServiceKey};

use registry::{Registry, Running};

/// Process supervisor over the groups of a [`GroupStore`]
#[derive(Clone)]
pub struct Supervisor {
    store: Arc<dyn GroupStore>,
    registry: Arc<Registry>,
}

impl fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("running", &self.registry.len())
            .finish()
    }
}

impl Supervisor {
    /// Create a supervisor with nothing running
    pub fn new(store: Arc<dyn GroupStore>) -> Self {
        Self {
            store,
            registry: Arc::new(Registry::default()),
        }
    }

    /// Group store backing this supervisor
    pub fn store(&self) -> &Arc<dyn GroupStore> {
        &self.store
    }

    /// Whether `group/service` currently has a live process
    pub fn is_running(&self, group: &str, service: &str) -> bool {
        self.registry.contains(&ServiceKey::new(group, service))
    }

    /// Number of live processes
    pub fn running_count(&self) -> usize {
        self.registry.len()
    }

    /// Start one service of `group`
    ///
    /// Fails with [`CoreError::AlreadyRunning`] while the key is live or
    /// another start of it is in flight. Must be called inside a tokio
    /// runtime; the exit-wait task is spawned onto it.
    pub fn start_service(&self, group: &Group, service: &Service) -> Result<()> {
        let key = ServiceKey::new(&group.name, &service.name);
        let reservation = self
            .registry
            .reserve(&key)
            .ok_or_else(|| CoreError::AlreadyRunning(key.to_string()))?;

        let plan = LaunchPlan::resolve(group, service);
        let logs = LogFiles::open(&plan)?;
        let (stdout, stderr) = logs.stdio()?;
        let child = process::spawn(&plan.spec, stdout, stderr)?;
        let pid = child.pid();

        let (state_tx, state_rx) = watch::channel(Lifecycle::Running);
        let (kill_tx, kill_rx) = mpsc::unbounded_channel();
        reservation.commit(Running {
            service: service.clone(),
            group: group.name.clone(),
            path: plan.spec.program.clone(),
            dir: plan.spec.dir.clone(),
            pid,
            lifecycle: state_rx,
            kill: kill_tx,
        });
        info!("{} is started with pid {}", key, pid);

        tokio::spawn(wait_exit(
            Arc::clone(&self.registry),
            key,
            child,
            logs,
            kill_rx,
            state_tx,
        ));
        Ok(())
    }

    /// Start every service of `group` in definition order
    ///
    /// A failing service does not stop the rest; the aggregate result is
    /// [`CoreError::PartialGroupFailure`] if any failed.
    pub async fn start_group(&self, group: &Group, progress: &Progress) -> Result<()> {
        let mut failed = false;
        for service in &group.services {
            let key = ServiceKey::new(&group.name, &service.name);
            info!("{} is starting", key);
            progress.line(format!("{} is starting", key));
            match self.start_service(group, service) {
                Ok(()) => progress.line(format!("{} is started", key)),
                Err(e) => {
                    warn!("{} is fail with {}", key, e);
                    progress.line(format!("{} is fail with {}", key, e));
                    failed = true;
                }
            }
        }
        if failed {
            Err(CoreError::PartialGroupFailure { action: "start" })
        } else {
            Ok(())
        }
    }

    /// Start the group called `name`
    pub async fn start_group_by_name(&self, name: &str, progress: &Progress) -> Result<()> {
        let group = self
            .store
            .find(name)
            .await
            .ok_or_else(|| CoreError::GroupNotFound(name.to_string()))?;
        self.start_group(&group, progress).await
    }

    /// Start every group in name order, returning the first error
    pub async fn start_all(&self, progress: &Progress) -> Result<()> {
        let mut first = None;
        for group in self.store.groups().await {
            if let Err(e) = self.start_group(&group, progress).await {
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }

    /// Start every group enabled for boot
    pub async fn start_enabled(&self, progress: &Progress) -> Result<()> {
        let mut first = None;
        for group in self.store.groups().await.into_iter().filter(|g| g.enabled) {
            if let Err(e) = self.start_group(&group, progress).await {
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }

    /// Start what `target` selects
    pub async fn start(&self, target: &Target, progress: &Progress) -> Result<()> {
        match target {
            Target::All => self.start_all(progress).await,
            Target::Named(name) => self.start_group_by_name(name, progress).await,
        }
    }

    /// Kill `group/service` and wait until its exit has been observed
    ///
    /// On success the key is already gone from the registry.
    pub async fn stop_service(&self, group: &str, service: &str) -> Result<()> {
        let key = ServiceKey::new(group, service);
        let running = self
            .registry
            .get(&key)
            .ok_or_else(|| CoreError::NotRunning(key.to_string()))?;

        debug!(
            "killing {} (pid {}, {})",
            key,
            running.pid,
            running.path.display()
        );
        // A closed channel means the exit is already being processed
        let _ = running.kill.send(());

        let mut lifecycle = running.lifecycle;
        lifecycle
            .wait_for(Lifecycle::is_stopped)
            .await
            .map_err(|_| CoreError::ServiceError(format!("{} exit was not observed", key)))?;
        Ok(())
    }

    /// Stop every live service `target` selects
    ///
    /// Entries are snapshotted first and stopped one by one; a service that
    /// exited meanwhile counts as stopped.
    pub async fn stop_group(&self, target: &Target, progress: &Progress) -> Result<()> {
        let stopping = self.registry.snapshot(|key| target.matches(&key.group));
        let mut failed = false;
        for (key, _) in stopping {
            info!("{} is stopping", key);
            progress.line(format!("{} is stopping", key));
            match self.stop_service(&key.group, &key.service).await {
                Ok(()) | Err(CoreError::NotRunning(_)) => {
                    info!("{} is stopped", key);
                    progress.line(format!("{} is stopped", key));
                }
                Err(e) => {
                    warn!("{} is fail with {}", key, e);
                    progress.line(format!("{} is fail with {}", key, e));
                    failed = true;
                }
            }
        }
        if failed {
            Err(CoreError::PartialGroupFailure { action: "stop" })
        } else {
            Ok(())
        }
    }

    /// Stop every live service
    pub async fn stop_all(&self, progress: &Progress) -> Result<()> {
        self.stop_group(&Target::All, progress).await
    }

    /// Point-in-time status of the services `target` selects
    ///
    /// Live entries come first, then every configured service without one.
    pub async fn status(&self, target: &Target) -> Vec<StatusRow> {
        let live = self.registry.snapshot(|key| target.matches(&key.group));
        let mut rows: Vec<StatusRow> = live
            .iter()
            .map(|(_, running)| StatusRow {
                state: RunState::Running,
                name: running.service.name.clone(),
                group: running.group.clone(),
                path: running.service.path.clone(),
                dir: running.dir.clone(),
            })
            .collect();

        for group in self.store.groups().await {
            if !target.matches(&group.name) {
                continue;
            }
            for service in &group.services {
                let key = ServiceKey::new(&group.name, &service.name);
                if live.iter().any(|(live_key, _)| *live_key == key) {
                    continue;
                }
                rows.push(StatusRow {
                    state: RunState::Stopped,
                    name: service.name.clone(),
                    group: group.name.clone(),
                    path: service.path.clone(),
                    dir: working_dir(&group, service),
                });
            }
        }
        rows
    }
}

/// Own `child` until it exits, then clean up and publish the outcome
async fn wait_exit(
    registry: Arc<Registry>,
    key: ServiceKey,
    mut child: ChildProcess,
    logs: LogFiles,
    mut kill_rx: mpsc::UnboundedReceiver<()>,
    state_tx: watch::Sender<Lifecycle>,
) {
    let exited = tokio::select! {
        status = child.wait() => Some(status),
        Some(()) = kill_rx.recv() => None,
    };
    let status = match exited {
        Some(status) => status,
        None => {
            if let Err(e) = child.kill_group() {
                warn!("kill {} fail with {}", key, e);
            }
            child.wait().await
        }
    };

    drop(logs);
    registry.remove(&key);

    let error = match status {
        Ok(status) if status.success() => None,
        Ok(status) => Some(status.to_string()),
        Err(e) => Some(e.to_string()),
    };
    info!(
        "{} is stopped by {}",
        key,
        error.as_deref().unwrap_or("normal exit")
    );
    state_tx.send_replace(Lifecycle::Stopped { error });
}
