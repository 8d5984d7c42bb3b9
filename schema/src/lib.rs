//! Schema definitions for serviced
//!
//! This crate contains the data structures shared by the daemon, the
//! supervisor core and the console client: service group definitions,
//! group selectors, status rows, configuration and the control protocol
//! wire format. Definition types implement JSON Schema generation so group
//! files can be validated by external tooling.

pub mod protocol;

pub use protocol::{terminal_line, Command, Reply, RequestError, ERR_MARKER, OK_MARKER};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Name of the file, inside the temp directory, that holds the control address
pub const DISCOVERY_FILE: &str = "console.serviced.txt";

/// Path of the discovery file for a given temp directory
pub fn discovery_path(temp_dir: impl AsRef<Path>) -> PathBuf {
    temp_dir.as_ref().join(DISCOVERY_FILE)
}

/// One supervisable executable with its launch parameters
///
/// Every string field may carry `${NAME}` / `${NAME,ALT}` tokens that are
/// resolved when the service is started.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Service {
    /// Service name, unique within its group
    #[serde(default)]
    pub name: String,

    /// Executable path, absolute or relative to the group file directory
    #[serde(default)]
    pub path: String,

    /// Full argv; the first element is presented to the child as `argv[0]`
    #[serde(default)]
    pub args: Vec<String>,

    /// Environment entries in `KEY=VALUE` form; nothing else is inherited
    #[serde(default)]
    pub env: Vec<String>,

    /// Working directory, absolute or relative to the group file directory
    #[serde(default)]
    pub dir: String,

    /// File that receives stdout (appended), relative to the working directory
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stdout: String,

    /// File that receives stderr; equal to `stdout` means both share one file
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stderr: String,
}

/// Named collection of services sharing one definition file
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Group {
    /// Group name, unique across the supervisor
    #[serde(default)]
    pub name: String,

    /// Services in start order
    #[serde(default)]
    pub services: Vec<Service>,

    /// File the group was loaded from
    #[serde(skip)]
    pub filename: PathBuf,

    /// Whether the group is started when the daemon boots
    #[serde(skip, default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Group {
    /// Directory containing the group definition, exposed as `CONF_DIR`
    pub fn conf_dir(&self) -> PathBuf {
        match self.filename.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Find a service of this group by name
    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.name == name)
    }
}

/// Selector for "every group" or one named group
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum Target {
    /// Every known group
    All,
    /// A single group by name
    Named(String),
}

impl Target {
    /// Wire keyword selecting every group
    pub const ALL_KEYWORD: &'static str = "all";
    /// Wildcard sentinel also selecting every group
    pub const WILDCARD: &'static str = "*";

    /// Interpret a wire argument
    pub fn parse(arg: &str) -> Self {
        match arg {
            Self::ALL_KEYWORD | Self::WILDCARD => Target::All,
            name => Target::Named(name.to_string()),
        }
    }

    /// Whether the selector covers the given group
    pub fn matches(&self, group: &str) -> bool {
        match self {
            Target::All => true,
            Target::Named(name) => name == group,
        }
    }

    /// Argument used on the wire
    pub fn as_wire(&self) -> &str {
        match self {
            Target::All => Self::ALL_KEYWORD,
            Target::Named(name) => name,
        }
    }
}

impl FromStr for Target {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Target::parse(s))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Observable state of one service instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum RunState {
    /// Process observed started and not yet observed exited
    Running,
    /// No live process
    Stopped,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Running => f.write_str("running"),
            RunState::Stopped => f.write_str("stopped"),
        }
    }
}

/// One line of a status report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusRow {
    /// Running or stopped
    pub state: RunState,
    /// Service name
    pub name: String,
    /// Group name
    pub group: String,
    /// Executable path as configured
    pub path: String,
    /// Live working directory, or the one a start would use
    pub dir: PathBuf,
}

impl StatusRow {
    /// Header line of the textual status table
    pub fn header() -> String {
        ["STATE", "NAME", "GROUP", "PATH", "DIR"].join("\t\t")
    }

    /// Render this row as a table line
    pub fn to_line(&self) -> String {
        format!(
            "{}\t\t{}\t\t{}\t\t{}\t\t{}",
            self.state,
            self.name,
            self.group,
            self.path,
            self.dir.display()
        )
    }
}

/// Configuration for the daemon process
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DaemonConfig {
    /// Daemon config file listing included group files
    pub config_file: PathBuf,
    /// Directory receiving the discovery file
    pub temp_dir: PathBuf,
    /// Log level for the daemon
    pub log_level: String,
    /// Start enabled groups right after bootstrap
    #[serde(default = "default_enabled")]
    pub autostart: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            config_file: PathBuf::from("serviced.json"),
            temp_dir: std::env::temp_dir(),
            log_level: "info".to_string(),
            autostart: true,
        }
    }
}

/// Client configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// Directory holding the daemon's discovery file
    pub temp_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            temp_dir: std::env::temp_dir(),
        }
    }
}
