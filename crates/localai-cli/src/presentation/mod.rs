//! Terminal output helpers.

mod tables;

pub use tables::{format_optional, format_size, print_separator, truncate_string};
