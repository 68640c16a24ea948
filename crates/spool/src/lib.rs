//! Spooled-directory transfers.
//!
//! A [`SpoolDaemon`] polls a set of directories through a [`FileMonitor`],
//! dispatches every file that has stopped changing to the configured
//! partners, and periodically reports its status to observer hosts. It
//! stops when its stop file appears or its handle is stopped.

pub mod config;
pub mod daemon;
pub mod error;
pub mod monitor;
mod observer;

pub use config::{ClientSettings, SpoolArguments, SpoolConfigFile};
pub use daemon::{DaemonState, SpoolDaemon, SpoolHandle};
pub use error::SpoolError;
pub use monitor::{Counters, FileItem, FileMonitor, MonitorStatus};
