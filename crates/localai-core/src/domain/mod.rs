//! Domain types for the catalog, supervisor and watcher.

pub mod model;
pub mod server;
pub mod watch;

pub use model::{
    DEFAULT_CTX_SIZE, DEFAULT_PRIORITY, DiscoveredModelFile, ModelDefinition, ModelSelector,
    ResolvedModel, ResolvedSelection,
};
pub use server::{
    ResumeOutcome, ServerRecord, ServerState, ServerStatusReport, StopOutcome, SuspendOutcome,
};
pub use watch::{WatchCheckpoint, WatchEvent, WatchEventKind, WatchState, WatcherRecord};
