//! Object storage module
//!
//! Defines the storage collaborator consumed by the transfer manager: object
//! identities, per-request options, and the readable/writable stream
//! capability. Ships a filesystem-backed store for local use.

mod client;
mod local;
mod object;

#[cfg(test)]
pub(crate) mod testing;

pub use client::*;
pub use local::*;
pub use object::*;
