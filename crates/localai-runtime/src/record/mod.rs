//! Persisted state: atomic JSON records, the state lock and pid verification.

mod io;
mod lock;
pub mod verify;

pub use io::{delete_record, read_record, write_record};
pub use lock::StateLock;
pub use verify::{Liveness, check_process};
