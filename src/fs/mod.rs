//! Local file system helpers
//!
//! Path mapping between object names and local files, the chunked stream
//! copy every transfer runs through, and shared bandwidth throttling.

mod paths;
mod stream;
pub mod throttle;

pub use paths::{object_name_for, strip_object_prefix};
pub use stream::{copy_stream, ChunkHooks, CopyError, HashWriter};
pub use throttle::BandwidthLimiter;
