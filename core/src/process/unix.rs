//! Unix process groups
//!
//! Each child calls `setsid()` before `exec`, becoming leader of a new
//! session and process group with no controlling terminal. Signals sent to
//! the group reach every process the service forked.

// setsid() in pre_exec needs unsafe
#![allow(unsafe_code)]

use super::SpawnSpec;
use crate::{CoreError, Result};
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::process::Command;
use tracing::{debug, error};

/// Apply argv[0] and process group setup to a command
pub(crate) fn prepare(command: &mut Command, spec: &SpawnSpec) {
    if let Some(argv0) = &spec.argv0 {
        command.arg0(argv0);
    }

    // Safety: setsid() is async-signal-safe and runs in the child before exec
    unsafe {
        command.pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

/// Send SIGKILL to the process group led by `pid`
///
/// `ESRCH` and `EPERM` mean the group is already gone and count as success.
pub fn signal_kill_group(pid: u32) -> Result<()> {
    let pgid = Pid::from_raw(pid as i32);
    debug!("Sending SIGKILL to process group {}", pgid);

    match killpg(pgid, Signal::SIGKILL) {
        Ok(()) => Ok(()),
        Err(nix::errno::Errno::ESRCH) => {
            debug!("Process group {} already exited", pgid);
            Ok(())
        }
        Err(nix::errno::Errno::EPERM) => {
            debug!(
                "Permission denied signaling process group {} (likely already exited)",
                pgid
            );
            Ok(())
        }
        Err(e) => {
            error!("Failed to send SIGKILL to process group {}: {}", pgid, e);
            Err(CoreError::ServiceError(format!(
                "Failed to send SIGKILL to process group {}: {}",
                pgid, e
            )))
        }
    }
}
