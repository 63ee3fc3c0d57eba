//! Port definitions implemented by the runtime.

pub mod platform;
pub mod server_control;

pub use platform::{DefaultDirs, PlatformPort, PlatformTag};
pub use server_control::ServerControlPort;

#[cfg(any(test, feature = "test-utils"))]
pub use platform::MockPlatformPort;
#[cfg(any(test, feature = "test-utils"))]
pub use server_control::MockServerControlPort;

