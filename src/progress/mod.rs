//! Progress reporting module
//!
//! Provides real-time progress bars for transfer batches with object counts,
//! byte throughput and ETA.

mod reporter;

pub use reporter::*;
