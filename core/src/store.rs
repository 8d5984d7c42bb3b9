//! Group store: durable service group definitions
//!
//! The daemon config file lists included group definition files together
//! with their enable flag:
//!
//! ```json
//! { "includes": { "/etc/serviced/web.json": true } }
//! ```
//!
//! Each included file defines one [`Group`]. Files ending in `.toml` are
//! parsed as TOML, everything else as JSON. Mutations are serialized by an
//! internal lock and persisted with an atomic write before they become
//! visible in memory.

use crate::{CoreError, Result};
use async_trait::async_trait;
use schema::Group;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Read/update access to group definitions
#[async_trait]
pub trait GroupStore: Send + Sync {
    /// Load the config file and every included group
    async fn load(&self) -> Result<()>;

    /// Persist the include list
    async fn save(&self) -> Result<()>;

    /// Find a group by name
    async fn find(&self, name: &str) -> Option<Group>;

    /// All known groups, ordered by name
    async fn groups(&self) -> Vec<Group>;

    /// Include the group defined in `path`
    async fn add(&self, path: &Path, enabled: bool) -> Result<Group>;

    /// Drop a group from the include list
    async fn remove(&self, name: &str) -> Result<Group>;

    /// Re-read a group definition from its file
    async fn reload(&self, name: &str) -> Result<()>;
}

/// On-disk shape of the daemon config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    includes: BTreeMap<PathBuf, bool>,
}

#[derive(Debug, Default)]
struct StoreState {
    includes: BTreeMap<PathBuf, bool>,
    groups: BTreeMap<String, Group>,
}

/// [`GroupStore`] backed by a JSON config file and per-group definition files
#[derive(Debug)]
pub struct FileGroupStore {
    filename: PathBuf,
    state: Mutex<StoreState>,
}

impl FileGroupStore {
    /// Create a store for the given config file; nothing is read until [`GroupStore::load`]
    pub fn new(filename: impl Into<PathBuf>) -> Self {
        Self {
            filename: filename.into(),
            state: Mutex::new(StoreState::default()),
        }
    }

    /// Path of the daemon config file
    pub fn filename(&self) -> &Path {
        &self.filename
    }
}

#[async_trait]
impl GroupStore for FileGroupStore {
    async fn load(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let config = match fs::read(&self.filename) {
            Ok(data) => serde_json::from_slice::<ConfigFile>(&data)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("config {} not found, creating it", self.filename.display());
                write_config(&self.filename, &state.includes)?;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let mut groups = BTreeMap::new();
        for (file, enabled) in &config.includes {
            let mut group = read_group(file)?;
            if group.name.is_empty() {
                warn!("load group from {} fail with group name is empty", file.display());
                continue;
            }
            if group.services.is_empty() {
                warn!("load group from {} fail with service list is empty", file.display());
                continue;
            }
            group.filename = file.clone();
            group.enabled = *enabled;
            info!(
                "load group {} from {} with {} service",
                group.name,
                file.display(),
                group.services.len()
            );
            groups.insert(group.name.clone(), group);
        }

        state.includes = config.includes;
        state.groups = groups;
        Ok(())
    }

    async fn save(&self) -> Result<()> {
        let state = self.state.lock().await;
        write_config(&self.filename, &state.includes)
    }

    async fn find(&self, name: &str) -> Option<Group> {
        self.state.lock().await.groups.get(name).cloned()
    }

    async fn groups(&self) -> Vec<Group> {
        self.state.lock().await.groups.values().cloned().collect()
    }

    async fn add(&self, path: &Path, enabled: bool) -> Result<Group> {
        let filename = absolute(path)?;
        let mut group = read_group(&filename)?;
        group.filename = filename.clone();
        group.enabled = enabled;
        validate_group(&group)?;

        let mut state = self.state.lock().await;
        if let Some(old) = state.groups.get(&group.name) {
            return Err(CoreError::ValidationError(format!(
                "group {} is exists from {}",
                group.name,
                old.filename.display()
            )));
        }

        let mut includes = state.includes.clone();
        includes.insert(filename.clone(), enabled);
        write_config(&self.filename, &includes)?;

        state.includes = includes;
        state.groups.insert(group.name.clone(), group.clone());
        info!(
            "add group {} from {} with {} service",
            group.name,
            filename.display(),
            group.services.len()
        );
        Ok(group)
    }

    async fn remove(&self, name: &str) -> Result<Group> {
        let mut state = self.state.lock().await;
        let group = state
            .groups
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::GroupNotFound(name.to_string()))?;

        let mut includes = state.includes.clone();
        includes.remove(&group.filename);
        write_config(&self.filename, &includes)?;

        state.includes = includes;
        state.groups.remove(name);
        info!("remove group {} from {}", name, group.filename.display());
        Ok(group)
    }

    async fn reload(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let current = state
            .groups
            .get(name)
            .ok_or_else(|| CoreError::GroupNotFound(name.to_string()))?;

        let mut fresh = read_group(&current.filename)?;
        fresh.filename = current.filename.clone();
        fresh.enabled = current.enabled;
        validate_group(&fresh)?;
        if fresh.name != name {
            return Err(CoreError::ValidationError(format!(
                "group {} was renamed to {} in {}",
                name,
                fresh.name,
                fresh.filename.display()
            )));
        }
        debug!("reloaded group {} with {} service", name, fresh.services.len());
        state.groups.insert(name.to_string(), fresh);
        Ok(())
    }
}

/// Check the rules every added group must satisfy
pub fn validate_group(group: &Group) -> Result<()> {
    if group.name.trim().is_empty() {
        return Err(CoreError::ValidationError(format!(
            "group name is required in {}",
            group.filename.display()
        )));
    }
    if group.services.is_empty() {
        return Err(CoreError::ValidationError(format!(
            "group {} services is empty from {}",
            group.name,
            group.filename.display()
        )));
    }
    for (index, service) in group.services.iter().enumerate() {
        if service.name.is_empty() || service.path.is_empty() {
            return Err(CoreError::ValidationError(format!(
                "group {} {} service name/path is required",
                group.name, index
            )));
        }
    }
    Ok(())
}

/// Parse one group definition file
pub fn read_group(path: &Path) -> Result<Group> {
    let data = fs::read_to_string(path).map_err(|e| {
        CoreError::ConfigurationError(format!("Failed to read group {}: {}", path.display(), e))
    })?;
    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    if is_toml {
        toml::from_str(&data).map_err(|e| {
            CoreError::ConfigurationError(format!("TOML parse error in {}: {}", path.display(), e))
        })
    } else {
        serde_json::from_str(&data).map_err(|e| {
            CoreError::ConfigurationError(format!("JSON parse error in {}: {}", path.display(), e))
        })
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Atomically replace the config file: temp file, fsync, rename
fn write_config(path: &Path, includes: &BTreeMap<PathBuf, bool>) -> Result<()> {
    info!("save config to {}", path.display());
    let result = write_config_inner(path, includes);
    match &result {
        Ok(()) => debug!("save config to {} success", path.display()),
        Err(e) => error!("save config to {} fail with {}", path.display(), e),
    }
    result
}

fn write_config_inner(path: &Path, includes: &BTreeMap<PathBuf, bool>) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let config = ConfigFile {
        includes: includes.clone(),
    };
    let json = serde_json::to_vec_pretty(&config)?;
    let tmp_path = path.with_extension("json.tmp");
    {
        let mut f = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        f.write_all(&json)?;
        f.flush()?;
        let _ = f.sync_all();
    }
    fs::rename(&tmp_path, path)?;

    if let Some(parent) = path.parent() {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_group(dir: &Path, file: &str, body: &str) -> PathBuf {
        let path = dir.join(file);
        fs::write(&path, body).unwrap();
        path
    }

    const WEB: &str = r#"{"name":"web","services":[{"name":"api","path":"/bin/sleep","args":["sleep","30"]}]}"#;

    #[tokio::test]
    async fn load_creates_missing_config() {
        let dir = tempdir().unwrap();
        let config = dir.path().join("serviced.json");
        let store = FileGroupStore::new(&config);
        store.load().await.unwrap();
        assert!(config.exists());
        assert!(store.groups().await.is_empty());
    }

    #[tokio::test]
    async fn add_persists_and_reloads() {
        let dir = tempdir().unwrap();
        let config = dir.path().join("serviced.json");
        let file = write_group(dir.path(), "web.json", WEB);

        let store = FileGroupStore::new(&config);
        store.load().await.unwrap();
        let group = store.add(&file, true).await.unwrap();
        assert_eq!(group.name, "web");
        assert_eq!(group.filename, file);
        assert!(store.find("web").await.is_some());

        let fresh = FileGroupStore::new(&config);
        fresh.load().await.unwrap();
        let loaded = fresh.find("web").await.expect("group persisted");
        assert_eq!(loaded.services.len(), 1);
        assert!(loaded.enabled);
    }

    #[tokio::test]
    async fn add_rejects_duplicate_name() {
        let dir = tempdir().unwrap();
        let store = FileGroupStore::new(dir.path().join("serviced.json"));
        let a = write_group(dir.path(), "a.json", WEB);
        let b = write_group(dir.path(), "b.json", WEB);
        store.add(&a, true).await.unwrap();
        let err = store.add(&b, true).await.unwrap_err();
        assert!(err.to_string().contains("group web is exists"));
    }

    #[tokio::test]
    async fn add_validates_definition() {
        let dir = tempdir().unwrap();
        let store = FileGroupStore::new(dir.path().join("serviced.json"));

        let empty = write_group(dir.path(), "empty.json", r#"{"name":"e","services":[]}"#);
        let err = store.add(&empty, true).await.unwrap_err();
        assert!(err.to_string().contains("services is empty"));

        let no_name = write_group(dir.path(), "noname.json", r#"{"services":[{"name":"a","path":"/bin/true"}]}"#);
        let err = store.add(&no_name, true).await.unwrap_err();
        assert!(err.to_string().contains("group name is required"));

        let no_path = write_group(dir.path(), "nopath.json", r#"{"name":"p","services":[{"name":"a"}]}"#);
        let err = store.add(&no_path, true).await.unwrap_err();
        assert!(err.to_string().contains("service name/path is required"));

        let err = store.add(&dir.path().join("missing.json"), true).await.unwrap_err();
        assert_eq!(err.code(), "CORE001");

        assert!(store.groups().await.is_empty());
    }

    #[tokio::test]
    async fn add_accepts_toml_definition() {
        let dir = tempdir().unwrap();
        let store = FileGroupStore::new(dir.path().join("serviced.json"));
        let file = write_group(
            dir.path(),
            "db.toml",
            "name = \"db\"\n[[services]]\nname = \"pg\"\npath = \"/bin/true\"\n",
        );
        let group = store.add(&file, false).await.unwrap();
        assert_eq!(group.name, "db");
        assert!(!group.enabled);
    }

    #[tokio::test]
    async fn remove_drops_group() {
        let dir = tempdir().unwrap();
        let config = dir.path().join("serviced.json");
        let file = write_group(dir.path(), "web.json", WEB);
        let store = FileGroupStore::new(&config);
        store.add(&file, true).await.unwrap();

        let removed = store.remove("web").await.unwrap();
        assert_eq!(removed.name, "web");
        assert!(store.find("web").await.is_none());
        assert!(matches!(
            store.remove("web").await,
            Err(CoreError::GroupNotFound(_))
        ));

        let fresh = FileGroupStore::new(&config);
        fresh.load().await.unwrap();
        assert!(fresh.groups().await.is_empty());
    }

    #[tokio::test]
    async fn reload_picks_up_changes() {
        let dir = tempdir().unwrap();
        let file = write_group(dir.path(), "web.json", WEB);
        let store = FileGroupStore::new(dir.path().join("serviced.json"));
        store.add(&file, true).await.unwrap();

        fs::write(
            &file,
            r#"{"name":"web","services":[{"name":"api","path":"/bin/true"},{"name":"worker","path":"/bin/true"}]}"#,
        )
        .unwrap();
        store.reload("web").await.unwrap();
        let group = store.find("web").await.unwrap();
        assert_eq!(group.services.len(), 2);
        assert_eq!(group.filename, file);
        assert!(store.reload("missing").await.is_err());
    }

    #[tokio::test]
    async fn load_skips_invalid_includes() {
        let dir = tempdir().unwrap();
        let empty = write_group(dir.path(), "empty.json", r#"{"name":"e","services":[]}"#);
        let web = write_group(dir.path(), "web.json", WEB);
        let config = dir.path().join("serviced.json");
        let body = serde_json::json!({ "includes": { empty.to_str().unwrap(): true, web.to_str().unwrap(): false } });
        fs::write(&config, body.to_string()).unwrap();

        let store = FileGroupStore::new(&config);
        store.load().await.unwrap();
        let groups = store.groups().await;
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "web");
        assert!(!groups[0].enabled);
    }
}
