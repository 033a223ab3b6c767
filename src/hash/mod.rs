//! Hash computation module
//!
//! Streaming digests (XXHash3, XXHash64, BLAKE3, SHA-256) computed over the
//! bytes of each transfer as they pass through the worker buffer.

mod integrity;

pub use integrity::*;
