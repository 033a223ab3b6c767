//! Parallel transfer engine
//!
//! Provides the transfer manager, the bounded worker pool and its QoS gate,
//! per-object transfer tasks, and the job handles results are collected in.

mod job;
mod manager;
mod pool;
pub mod qos;
mod result;
mod task;

pub use job::{DownloadJob, JobHandle, UploadJob};
pub use manager::TransferManager;
pub use pool::WorkerContext;
pub use qos::{Admission, AdmissionContext, MemoryBudgetQos, NoopQos, Qos, StartRateQos};
pub use result::{BatchSummary, DownloadResult, TransferResult, TransferStatus, UploadResult};
