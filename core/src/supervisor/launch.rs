//! Resolution of a service definition into concrete launch parameters
//!
//! Tokens are resolved against `CONF_DIR` (the directory of the group
//! definition) and then the daemon environment. Relative working
//! directories and executables are anchored at `CONF_DIR`; relative log
//! files at the working directory.

use crate::process::SpawnSpec;
use crate::subst::{self, Values};
use crate::Result;
use schema::{Group, Service};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tracing::error;

/// Token naming the group definition directory
pub const CONF_DIR: &str = "CONF_DIR";

fn values(group: &Group) -> Values {
    let mut values = Values::new();
    values.insert(
        CONF_DIR.to_string(),
        group.conf_dir().to_string_lossy().into_owned(),
    );
    values
}

fn anchored(base: &Path, raw: String) -> PathBuf {
    let path = PathBuf::from(raw);
    if path.as_os_str().is_empty() {
        base.to_path_buf()
    } else if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Working directory a start of `service` would use
pub fn working_dir(group: &Group, service: &Service) -> PathBuf {
    let values = values(group);
    anchored(&group.conf_dir(), subst::substitute(&values, &service.dir, false))
}

/// Everything needed to open log files and spawn one service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    /// Process parameters
    pub spec: SpawnSpec,
    /// Resolved stdout file
    pub stdout: Option<PathBuf>,
    /// Resolved stderr file; `None` with `shared_output` means stdout is reused
    pub stderr: Option<PathBuf>,
    /// Stderr goes to the stdout file
    pub shared_output: bool,
}

impl LaunchPlan {
    /// Resolve tokens and relative paths of `service` within `group`
    pub fn resolve(group: &Group, service: &Service) -> Self {
        let values = values(group);
        let conf_dir = group.conf_dir();
        let expand = |raw: &str| subst::substitute(&values, raw, false);

        let dir = anchored(&conf_dir, expand(&service.dir));
        let program = anchored(&conf_dir, expand(&service.path));
        let argv = service.args.iter().map(|arg| expand(arg)).collect();
        let env = service.env.iter().map(|entry| expand(entry)).collect();

        let stdout = (!service.stdout.is_empty()).then(|| anchored(&dir, expand(&service.stdout)));
        let shared_output = !service.stderr.is_empty() && service.stderr == service.stdout;
        let stderr = (!service.stderr.is_empty() && !shared_output)
            .then(|| anchored(&dir, expand(&service.stderr)));

        Self {
            spec: SpawnSpec::from_argv(program, argv, env, dir),
            stdout,
            stderr,
            shared_output,
        }
    }
}

/// Log files of one running service, held open until it exits
#[derive(Debug, Default)]
pub struct LogFiles {
    stdout: Option<File>,
    stderr: Option<File>,
    shared: bool,
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .map_err(|e| {
            error!("open log file {} fail with {}", path.display(), e);
            e.into()
        })
}

impl LogFiles {
    /// Open (append, create) the files named by `plan`
    ///
    /// A failure drops any file already opened.
    pub fn open(plan: &LaunchPlan) -> Result<Self> {
        let stdout = plan.stdout.as_deref().map(open_append).transpose()?;
        let stderr = plan.stderr.as_deref().map(open_append).transpose()?;
        Ok(Self {
            stdout,
            stderr,
            shared: plan.shared_output,
        })
    }

    /// Child-side handles; the null device where no file is configured
    pub fn stdio(&self) -> Result<(Stdio, Stdio)> {
        let stdout = match &self.stdout {
            Some(file) => Stdio::from(file.try_clone()?),
            None => Stdio::null(),
        };
        let stderr = match (&self.stderr, &self.stdout) {
            (Some(file), _) => Stdio::from(file.try_clone()?),
            (None, Some(file)) if self.shared => Stdio::from(file.try_clone()?),
            _ => Stdio::null(),
        };
        Ok((stdout, stderr))
    }
}
