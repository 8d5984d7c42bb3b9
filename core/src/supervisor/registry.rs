//! Live process registry
//!
//! A key is present in `running` exactly while its process has been seen
//! started and not yet seen exited. Starts in flight sit in `pending` so a
//! second start of the same key is refused before it can spawn.

use schema::Service;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::{mpsc, watch};

/// `group/service` identity of a supervised process
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceKey {
    /// Group name
    pub group: String,
    /// Service name
    pub service: String,
}

impl ServiceKey {
    /// Build a key from group and service names
    pub fn new(group: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            service: service.into(),
        }
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.service)
    }
}

/// Lifecycle published by a process's exit-wait task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lifecycle {
    /// Process is alive
    Running,
    /// Process exited; `error` describes an abnormal exit
    Stopped {
        /// Exit description when the process did not exit cleanly
        error: Option<String>,
    },
}

impl Lifecycle {
    /// Whether the process has been observed exited
    pub fn is_stopped(&self) -> bool {
        matches!(self, Lifecycle::Stopped { .. })
    }
}

/// One live process
#[derive(Debug, Clone)]
pub(crate) struct Running {
    pub(crate) service: Service,
    pub(crate) group: String,
    pub(crate) path: PathBuf,
    pub(crate) dir: PathBuf,
    pub(crate) pid: u32,
    pub(crate) lifecycle: watch::Receiver<Lifecycle>,
    pub(crate) kill: mpsc::UnboundedSender<()>,
}

#[derive(Debug, Default)]
struct Entries {
    running: HashMap<ServiceKey, Running>,
    pending: HashSet<ServiceKey>,
}

/// `group/service` → [`Running`] map behind one reader/writer lock
///
/// The lock is only held for map operations, never across an await.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    entries: RwLock<Entries>,
}

impl Registry {
    fn read(&self) -> RwLockReadGuard<'_, Entries> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Entries> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim `key` for a start; `None` when it is live or already claimed
    pub(crate) fn reserve(&self, key: &ServiceKey) -> Option<Reservation<'_>> {
        let mut entries = self.write();
        if entries.running.contains_key(key) || entries.pending.contains(key) {
            return None;
        }
        entries.pending.insert(key.clone());
        Some(Reservation {
            registry: self,
            key: key.clone(),
            committed: false,
        })
    }

    pub(crate) fn get(&self, key: &ServiceKey) -> Option<Running> {
        self.read().running.get(key).cloned()
    }

    pub(crate) fn contains(&self, key: &ServiceKey) -> bool {
        self.read().running.contains_key(key)
    }

    /// Drop the entry of an exited process
    pub(crate) fn remove(&self, key: &ServiceKey) -> Option<Running> {
        self.write().running.remove(key)
    }

    /// Copy of every live entry matching `filter`, ordered by key
    pub(crate) fn snapshot<F>(&self, filter: F) -> Vec<(ServiceKey, Running)>
    where
        F: Fn(&ServiceKey) -> bool,
    {
        let entries = self.read();
        let mut matched: Vec<_> = entries
            .running
            .iter()
            .filter(|(key, _)| filter(key))
            .map(|(key, running)| (key.clone(), running.clone()))
            .collect();
        matched.sort_by(|a, b| a.0.cmp(&b.0));
        matched
    }

    pub(crate) fn len(&self) -> usize {
        self.read().running.len()
    }
}

/// Claim on a key during a start; released on drop unless committed
#[derive(Debug)]
pub(crate) struct Reservation<'a> {
    registry: &'a Registry,
    key: ServiceKey,
    committed: bool,
}

impl Reservation<'_> {
    /// Publish the started process, turning the claim into a live entry
    pub(crate) fn commit(mut self, running: Running) {
        let mut entries = self.registry.write();
        entries.pending.remove(&self.key);
        entries.running.insert(self.key.clone(), running);
        self.committed = true;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.registry.write().pending.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running(group: &str) -> (Running, watch::Sender<Lifecycle>) {
        let (tx, rx) = watch::channel(Lifecycle::Running);
        let (kill, _) = mpsc::unbounded_channel();
        let entry = Running {
            service: Service::default(),
            group: group.to_string(),
            path: PathBuf::from("/bin/true"),
            dir: PathBuf::from("/"),
            pid: 1,
            lifecycle: rx,
            kill,
        };
        (entry, tx)
    }

    #[test]
    fn test_key_display() {
        assert_eq!(ServiceKey::new("web", "api").to_string(), "web/api");
    }

    #[test]
    fn test_reservation_excludes_second_claim() {
        let registry = Registry::default();
        let key = ServiceKey::new("g", "s");

        let first = registry.reserve(&key).expect("first claim");
        assert!(registry.reserve(&key).is_none());
        assert!(!registry.contains(&key));

        let (entry, _tx) = running("g");
        first.commit(entry);
        assert!(registry.contains(&key));
        assert!(registry.reserve(&key).is_none());

        registry.remove(&key);
        assert!(registry.reserve(&key).is_some());
    }

    #[test]
    fn test_dropped_reservation_releases_key() {
        let registry = Registry::default();
        let key = ServiceKey::new("g", "s");
        drop(registry.reserve(&key));
        assert!(registry.reserve(&key).is_some());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_snapshot_filters_and_orders() {
        let registry = Registry::default();
        for (group, service) in [("b", "x"), ("a", "y"), ("a", "x")] {
            let key = ServiceKey::new(group, service);
            let (entry, _tx) = running(group);
            registry.reserve(&key).unwrap().commit(entry);
        }
        let keys: Vec<String> = registry
            .snapshot(|key| key.group == "a")
            .into_iter()
            .map(|(key, _)| key.to_string())
            .collect();
        assert_eq!(keys, vec!["a/x", "a/y"]);
        assert_eq!(registry.snapshot(|_| true).len(), 3);
    }
}
