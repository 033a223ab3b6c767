//! # bulkxfer - Parallel Bulk Transfers for Object Storage
//!
//! bulkxfer downloads many objects into a local directory, or uploads many
//! local files into a bucket, on a bounded pool of worker threads. Each item
//! of a batch resolves to its own result; a failing item never aborts its
//! siblings.
//!
//! ## Features
//!
//! - **Bounded Parallelism**: A fixed pool of workers, one reusable buffer each
//! - **Per-Item Outcomes**: `SUCCESS`, `SKIPPED`, `FAILED_TO_START`, `FAILED`
//! - **Skip If Exists**: Existing destinations are skipped before any storage call
//! - **Admission Control**: Pluggable QoS gate consulted before each task starts
//! - **Integrity Reporting**: XXHash3, XXHash64, BLAKE3 or SHA-256 over streamed bytes
//! - **Bandwidth Limiting**: One token bucket shared by every worker
//!
//! ## Quick Start
//!
//! ```no_run
//! use bulkxfer::prelude::*;
//!
//! let config = TransferManagerConfig::builder()
//!     .max_workers(16)
//!     .storage_options(StorageOptions::local("/srv/store"))
//!     .build()?;
//! let manager = TransferManager::new(config)?;
//!
//! let download = ParallelDownloadConfig::builder()
//!     .bucket_name("photos")
//!     .strip_prefix("2024/")
//!     .download_directory("./photos")
//!     .skip_if_exists(true)
//!     .build()?;
//!
//! let blobs = vec![
//!     BlobInfo::of("photos", "2024/beach.jpg"),
//!     BlobInfo::of("photos", "2024/forest.jpg"),
//! ];
//! let results = manager.download_blobs(blobs, &download).download_results()?;
//!
//! BatchSummary::from_results(&results).print_summary();
//! # Ok::<(), bulkxfer::error::XferError>(())
//! ```
//!
//! ## Uploads with Admission Control
//!
//! ```no_run
//! use bulkxfer::prelude::*;
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! let config = TransferManagerConfig::builder()
//!     .storage_options(StorageOptions::local("/srv/store"))
//!     .checksum(Some(HashAlgorithm::Blake3))
//!     .build()?;
//!
//! // Keep staging memory under 256 MiB
//! let manager = TransferManager::with_qos(config, Arc::new(MemoryBudgetQos::new(256 << 20)))?;
//!
//! let upload = ParallelUploadConfig::builder()
//!     .bucket_name("backups")
//!     .upload_directory("/data")
//!     .prefix("nightly/")
//!     .skip_if_exists(true)
//!     .build()?;
//!
//! let job = manager.upload_files(vec![PathBuf::from("db.dump")], &upload);
//! for result in job.upload_results()? {
//!     println!("{} {}", result.status(), result.destination().id);
//! }
//! # Ok::<(), bulkxfer::error::XferError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod core;
pub mod error;
pub mod fs;
pub mod hash;
pub mod progress;
pub mod storage;

// Re-export commonly used types
pub use config::{HashAlgorithm, ParallelDownloadConfig, ParallelUploadConfig, TransferManagerConfig};
pub use core::{DownloadJob, DownloadResult, TransferManager, TransferStatus, UploadJob, UploadResult};
pub use error::{Result, XferError};
pub use progress::ProgressReporter;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    //! Convenient re-exports for common usage
    //!
    //! ```no_run
    //! use bulkxfer::prelude::*;
    //! ```

    pub use crate::config::{
        HashAlgorithm, ParallelDownloadConfig, ParallelUploadConfig, PrefixMismatch, TransferManagerConfig,
    };
    pub use crate::core::{
        Admission, AdmissionContext, BatchSummary, DownloadJob, DownloadResult, MemoryBudgetQos, NoopQos, Qos,
        StartRateQos, TransferManager, TransferResult, TransferStatus, UploadJob, UploadResult,
    };
    pub use crate::error::{Result, XferError};
    pub use crate::hash::HashResult;
    pub use crate::progress::ProgressReporter;
    pub use crate::storage::{BlobId, BlobInfo, LocalObjectStorage, ObjectStorage, SourceOption, StorageOptions, TargetOption};
}
