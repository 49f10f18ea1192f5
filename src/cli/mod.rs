//! Command-line interface for didrep.

mod commands;
pub mod icons;
pub mod progress;
pub mod shutdown;

pub use commands::{is_verbose, run};
