//! Process spawning for supervised services
//!
//! Services are launched with exactly the environment they declare, an
//! explicit `argv[0]`, and stdin attached to the null device. On Unix every
//! child leads its own process group so a kill reaches the whole tree.

use crate::{CoreError, Result};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::{debug, error, warn};

#[cfg(unix)]
pub mod unix;

/// Fully resolved launch parameters of one process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpawnSpec {
    /// Executable to run
    pub program: PathBuf,
    /// Name presented to the child as `argv[0]`; the program path when absent
    pub argv0: Option<String>,
    /// Arguments following `argv[0]`
    pub args: Vec<String>,
    /// Complete environment of the child, `KEY=VALUE`
    pub env: Vec<String>,
    /// Working directory
    pub dir: PathBuf,
}

impl SpawnSpec {
    /// Build a spec from a full argv (first element is `argv[0]`)
    pub fn from_argv(program: PathBuf, argv: Vec<String>, env: Vec<String>, dir: PathBuf) -> Self {
        let mut argv = argv.into_iter();
        let argv0 = argv.next();
        Self {
            program,
            argv0,
            args: argv.collect(),
            env,
            dir,
        }
    }

    /// Environment entries split into key/value pairs
    pub fn env_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.env.iter().filter_map(|entry| match entry.split_once('=') {
            Some((key, value)) if !key.is_empty() => Some((key, value)),
            _ => {
                warn!("ignoring malformed env entry {:?}", entry);
                None
            }
        })
    }
}

/// A spawned child process
#[derive(Debug)]
pub struct ChildProcess {
    pid: u32,
    child: Child,
}

impl ChildProcess {
    /// Get the process ID
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Wait for the process to exit
    pub async fn wait(&mut self) -> Result<std::process::ExitStatus> {
        self.child.wait().await.map_err(|e| {
            CoreError::ServiceError(format!("Failed to wait for process {}: {}", self.pid, e))
        })
    }

    /// Forcefully kill the process and, on Unix, its whole process group
    pub fn kill_group(&mut self) -> Result<()> {
        #[cfg(unix)]
        {
            unix::signal_kill_group(self.pid)
        }
        #[cfg(not(unix))]
        {
            self.child.start_kill().map_err(|e| {
                CoreError::ServiceError(format!("Failed to kill process {}: {}", self.pid, e))
            })
        }
    }
}

/// Spawn a process from a resolved spec with the given output handles
pub fn spawn(spec: &SpawnSpec, stdout: Stdio, stderr: Stdio) -> Result<ChildProcess> {
    debug!(
        "Spawning process: {} {:?} in {}",
        spec.program.display(),
        spec.args,
        spec.dir.display()
    );

    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .env_clear()
        .envs(spec.env_pairs())
        .current_dir(&spec.dir)
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(stderr);

    #[cfg(unix)]
    unix::prepare(&mut command, spec);

    let child = command.spawn().map_err(|e| {
        error!("Failed to spawn process '{}': {}", spec.program.display(), e);
        CoreError::SpawnFailure(format!("{}: {}", spec.program.display(), e))
    })?;

    let pid = child
        .id()
        .ok_or_else(|| CoreError::SpawnFailure("Spawned child did not have a PID".to_string()))?;
    debug!("Successfully spawned process {}", pid);

    Ok(ChildProcess { pid, child })
}
