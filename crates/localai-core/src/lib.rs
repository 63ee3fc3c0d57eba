//! Core of local-ai: domain types, the model catalog, configuration and the
//! ports implemented by the runtime.
//!
//! This crate has no process or OS dependencies. The runtime crate provides
//! the supervisor, the watcher and the platform adapters.

pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
pub mod paths;
pub mod ports;

pub use catalog::{CatalogEntry, CatalogError, ModelCatalog};
pub use config::{
    ConfigError, ServerSettings, SteamSettings, SystemConfig, load_config, override_context,
    parse_extra_args, save_config, validate_config,
};
pub use domain::{
    DiscoveredModelFile, ModelDefinition, ModelSelector, ResolvedModel, ResolvedSelection,
    ResumeOutcome, ServerRecord, ServerState, ServerStatusReport, StopOutcome, SuspendOutcome,
    WatchCheckpoint, WatchEvent, WatchEventKind, WatchState, WatcherRecord,
};
pub use error::{CoreError, CoreResult};
pub use paths::{PathError, StatePaths, config_file_path, normalize_user_path};
pub use ports::{DefaultDirs, PlatformPort, PlatformTag, ServerControlPort};

#[cfg(any(test, feature = "test-utils"))]
pub use ports::{MockPlatformPort, MockServerControlPort};
