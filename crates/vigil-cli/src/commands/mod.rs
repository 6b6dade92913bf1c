//! CLI commands module
//!
//! Contains all CLI command implementations.

pub mod account;
pub mod config;
pub mod sync;
pub mod users;

use std::path::PathBuf;

use crate::output::OutputFormat;
use vigil_core::connectivity::ConnectivityHandle;
use vigil_core::Vigil;

/// Shared context for all commands
pub struct Context {
    pub app: Vigil,
    pub connectivity: ConnectivityHandle,
    pub config_file: PathBuf,
    pub format: OutputFormat,
    pub quiet: bool,
    /// `--offline` was passed; never touch the network
    pub offline: bool,
}
