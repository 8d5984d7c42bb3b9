//! Daemon library for serviced
//!
//! Wires the group store, the supervisor and the control server together
//! and exposes a handle for orderly shutdown.

#![allow(unused_crate_dependencies)]

pub mod bootstrap;
pub mod simple_error;


pub use bootstrap::{bootstrap, BootstrapHandle};
pub use simple_error::{DaemonError, Result};
