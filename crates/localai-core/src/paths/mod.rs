//! Path utilities for local-ai state and configuration files.
//!
//! # Design
//!
//! - Returns `PathBuf` and `PathError` for clear error handling
//! - Platform default directories come from `PlatformPort`, not from here
//! - Only the layout of files *inside* those directories is decided here

mod config;
mod error;
mod normalize;
mod state;

#[cfg(test)]
mod test_utils;

pub use config::{CONFIG_ENV, CONFIG_FILENAME, config_file_path};
pub use error::PathError;
pub use normalize::{ensure_directory, normalize_user_path};
pub use state::{STATE_DIR_ENV, StatePaths};
