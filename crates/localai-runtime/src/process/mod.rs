//! Server process management: command building, spawning and shutdown.

mod command;
pub mod shutdown;

pub use command::{ServerEndpoint, build_server_args, spawn_server};
pub use shutdown::{shutdown_child, terminate_pid};
