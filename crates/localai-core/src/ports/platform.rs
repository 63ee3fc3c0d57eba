//! OS capability port.
//!
//! Everything platform specific (default directories, binary lookup, killing
//! processes by name, login autostart) sits behind [`PlatformPort`]. One
//! implementation is chosen at startup from [`PlatformTag::detect`] and
//! injected into the services that need it.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::domain::ModelSelector;
use crate::error::CoreError;

/// Operating system family the process runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformTag {
    Linux,
    MacOs,
    Windows,
}

impl PlatformTag {
    /// Tag of the running OS. Other unix flavours use the Linux behaviour.
    pub const fn detect() -> Self {
        if cfg!(target_os = "macos") {
            Self::MacOs
        } else if cfg!(windows) {
            Self::Windows
        } else {
            Self::Linux
        }
    }

    /// Executable name of the inference server on this platform.
    pub const fn server_binary_name(self) -> &'static str {
        match self {
            Self::Windows => "llama-server.exe",
            Self::Linux | Self::MacOs => "llama-server",
        }
    }
}

impl fmt::Display for PlatformTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linux => write!(f, "linux"),
            Self::MacOs => write!(f, "macos"),
            Self::Windows => write!(f, "windows"),
        }
    }
}

/// Platform default directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultDirs {
    pub models: PathBuf,
    pub cache: PathBuf,
    pub log: PathBuf,
    pub config: PathBuf,
}

/// Narrow OS capability interface consumed by the core.
#[cfg_attr(any(test, feature = "test-utils"), mockall::automock)]
pub trait PlatformPort: Send + Sync {
    fn tag(&self) -> PlatformTag;

    /// Default models/cache/log/config directories.
    fn resolve_default_dirs(&self) -> Result<DefaultDirs, CoreError>;

    /// Locate an executable by name, `NotFound` when absent.
    fn find_binary(&self, name: &str) -> Result<PathBuf, CoreError>;

    /// Terminate every process whose name matches one of `names`.
    ///
    /// Returns the number of processes signalled.
    fn kill_by_name(&self, names: &[String]) -> usize;

    /// Candidate directories holding Steam's logs, most likely first.
    fn steam_log_dirs(&self) -> Vec<PathBuf>;

    /// Start `local-ai start --background` with `selector` at login.
    fn register_autostart(&self, program: &Path, selector: &ModelSelector)
    -> Result<(), CoreError>;

    fn unregister_autostart(&self) -> Result<(), CoreError>;

    fn is_autostart_registered(&self) -> bool;
}
