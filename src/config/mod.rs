//! Configuration module for bulkxfer
//!
//! Provides the validated transfer and batch configurations used by the
//! library, plus the CLI arguments of the binary.

mod parallel;
mod settings;
mod transfer;

pub use parallel::*;
pub use settings::*;
pub use transfer::*;
