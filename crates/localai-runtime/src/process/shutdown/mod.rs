//! Graceful process shutdown for the inference server.
//!
//! Provides two shutdown strategies:
//! - `shutdown_child`: for a server spawned by this process (includes reaping)
//! - `terminate_pid`: for a server started by another invocation (pid only)

mod child;
mod pid;

pub use child::shutdown_child;
pub use pid::terminate_pid;
