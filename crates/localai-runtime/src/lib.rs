#![deny(unsafe_code)]
//! Runtime of local-ai: the llama-server supervisor, the Steam game watcher
//! and the OS adapters behind [`localai_core::PlatformPort`].

mod health;
pub mod platform;
pub mod process;
pub mod record;
mod supervisor;
pub mod watcher;

// Re-export health utilities for direct use if needed
pub use health::{check_http_health, wait_for_http_health};

pub use platform::{detect_platform, platform_for};
pub use supervisor::{ServerSupervisor, StartMode, SupervisorConfig};
pub use watcher::{SteamWatcher, WatchSummary, WatcherOptions, locate_steam_log};
