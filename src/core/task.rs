//! Transfer tasks
//!
//! One task moves one object. A task always produces exactly one result:
//! failures and panics become a status plus a cause instead of escaping to
//! the worker or to sibling tasks.

use crate::config::{ParallelDownloadConfig, ParallelUploadConfig};
use crate::core::job::ResultSink;
use crate::core::pool::{Runnable, WorkerContext};
use crate::core::{DownloadResult, TransferResult, TransferStatus, UploadResult};
use crate::error::{IoResultExt, XferError};
use crate::fs::{copy_stream, ChunkHooks, CopyError, HashWriter};
use crate::hash::StreamingHasher;
use crate::progress::ProgressReporter;
use crate::storage::{BlobId, BlobInfo};
use std::any::Any;
use std::fs::File;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// A single download or upload
pub(crate) trait Transfer: Send + 'static {
    /// Result kind
    type Output: TransferResult + Send + 'static;

    /// Short description used in logs
    fn label(&self) -> String;

    /// Object size, if known before starting
    fn size_hint(&self) -> Option<u64> {
        None
    }

    /// Run the transfer on a worker
    fn execute(&self, ctx: &mut WorkerContext, progress: Option<&ProgressReporter>) -> Self::Output;

    /// Result for a transfer that did not run to completion
    fn abandon(&self, status: TransferStatus, cause: XferError) -> Self::Output;
}

fn copy_failure(err: CopyError, object: &BlobId, local: &std::path::Path) -> XferError {
    match err {
        CopyError::Read(e) => XferError::storage(format!("reading {}: {}", object, e)),
        CopyError::Write(e) => XferError::io(local, e),
    }
}

/// Download of one object into the download directory
pub(crate) struct DownloadTransfer {
    blob: BlobInfo,
    config: Arc<ParallelDownloadConfig>,
}

impl DownloadTransfer {
    pub(crate) fn new(blob: BlobInfo, config: Arc<ParallelDownloadConfig>) -> Self {
        Self { blob, config }
    }

    /// The object read: the job's bucket plus the item's name and generation
    fn object_id(&self) -> BlobId {
        BlobId {
            bucket: self.config.bucket_name().to_string(),
            name: self.blob.name().to_string(),
            generation: self.blob.id.generation,
        }
    }

    /// Destination for reporting, even when the name cannot be mapped
    fn reported_destination(&self) -> PathBuf {
        self.config
            .destination_for(&self.blob)
            .unwrap_or_else(|_| self.config.download_directory().to_path_buf())
    }

    fn fail(&self, destination: PathBuf, status: TransferStatus, cause: XferError, bytes: Option<u64>) -> DownloadResult {
        DownloadResult::failure(self.blob.clone(), destination, status, cause, bytes)
    }
}

impl Transfer for DownloadTransfer {
    type Output = DownloadResult;

    fn label(&self) -> String {
        self.object_id().to_string()
    }

    fn size_hint(&self) -> Option<u64> {
        self.blob.size
    }

    fn execute(&self, ctx: &mut WorkerContext, progress: Option<&ProgressReporter>) -> DownloadResult {
        let destination = match self.config.destination_for(&self.blob) {
            Ok(destination) => destination,
            Err(e) => return self.fail(self.reported_destination(), TransferStatus::FailedToStart, e, None),
        };

        if self.config.skip_if_exists() && std::fs::symlink_metadata(&destination).is_ok() {
            debug!("Skipping {}: {} exists", self.blob.id, destination.display());
            return DownloadResult::skipped(self.blob.clone(), destination);
        }

        if let Some(parent) = destination.parent() {
            if let Err(e) = std::fs::create_dir_all(parent).with_path(parent) {
                return self.fail(destination, TransferStatus::FailedToStart, e, None);
            }
        }

        let object = self.object_id();
        let mut reader = match ctx.storage.reader(&object, self.config.options_per_request()) {
            Ok(reader) => reader,
            Err(e) => return self.fail(destination, TransferStatus::FailedToStart, e, None),
        };

        let mut file = match File::create(&destination).with_path(&destination) {
            Ok(file) => file,
            Err(e) => return self.fail(destination, TransferStatus::FailedToStart, e, None),
        };

        let mut hasher = ctx.checksum.map(StreamingHasher::new);
        let on_chunk = |bytes: u64| {
            if let Some(progress) = progress {
                progress.increment_bytes(bytes);
            }
        };
        let mut copied = 0;
        let outcome = copy_stream(
            &mut reader,
            &mut file,
            &mut ctx.buffer,
            ChunkHooks {
                hasher: hasher.as_mut().map(|h| h as &mut dyn HashWriter),
                limiter: ctx.limiter.as_ref(),
                on_chunk: Some(&on_chunk),
            },
            &mut copied,
        );

        match outcome {
            Ok(bytes) => DownloadResult::success(
                self.blob.clone(),
                destination,
                bytes,
                hasher.map(StreamingHasher::finalize),
            ),
            Err(e) => {
                let cause = copy_failure(e, &object, &destination);
                self.fail(destination, TransferStatus::Failed, cause, Some(copied))
            }
        }
    }

    fn abandon(&self, status: TransferStatus, cause: XferError) -> DownloadResult {
        self.fail(self.reported_destination(), status, cause, None)
    }
}

/// Upload of one local file into the job's bucket
pub(crate) struct UploadTransfer {
    file: PathBuf,
    config: Arc<ParallelUploadConfig>,
}

impl UploadTransfer {
    pub(crate) fn new(file: PathBuf, config: Arc<ParallelUploadConfig>) -> Self {
        Self { file, config }
    }

    fn reported_destination(&self) -> BlobInfo {
        self.config.destination_for(&self.file).unwrap_or_else(|_| {
            BlobInfo::of(self.config.bucket_name(), self.file.to_string_lossy().into_owned())
        })
    }

    fn fail(&self, destination: BlobInfo, status: TransferStatus, cause: XferError, bytes: Option<u64>) -> UploadResult {
        UploadResult::failure(self.file.clone(), destination, status, cause, bytes)
    }

    fn skips_on(&self, err: &XferError) -> bool {
        self.config.skip_if_exists() && err.is_already_exists()
    }
}

impl Transfer for UploadTransfer {
    type Output = UploadResult;

    fn label(&self) -> String {
        self.file.display().to_string()
    }

    fn execute(&self, ctx: &mut WorkerContext, progress: Option<&ProgressReporter>) -> UploadResult {
        let destination = match self.config.destination_for(&self.file) {
            Ok(destination) => destination,
            Err(e) => return self.fail(self.reported_destination(), TransferStatus::FailedToStart, e, None),
        };

        let source = self.config.source_for(&self.file);
        let mut file = match File::open(&source).with_path(&source) {
            Ok(file) => file,
            Err(e) => return self.fail(destination, TransferStatus::FailedToStart, e, None),
        };

        let mut writer = match ctx.storage.writer(&destination, &self.config.effective_options()) {
            Ok(writer) => writer,
            Err(e) if self.skips_on(&e) => {
                debug!("Skipping {}: {} exists", source.display(), destination.id);
                return UploadResult::skipped(self.file.clone(), destination);
            }
            Err(e) => return self.fail(destination, TransferStatus::FailedToStart, e, None),
        };

        if let (Some(progress), Ok(meta)) = (progress, file.metadata()) {
            progress.add_total_bytes(meta.len());
        }

        let mut hasher = ctx.checksum.map(StreamingHasher::new);
        let on_chunk = |bytes: u64| {
            if let Some(progress) = progress {
                progress.increment_bytes(bytes);
            }
        };
        let mut copied = 0;
        let outcome = copy_stream(
            &mut file,
            &mut writer,
            &mut ctx.buffer,
            ChunkHooks {
                hasher: hasher.as_mut().map(|h| h as &mut dyn HashWriter),
                limiter: ctx.limiter.as_ref(),
                on_chunk: Some(&on_chunk),
            },
            &mut copied,
        );

        let bytes = match outcome {
            Ok(bytes) => bytes,
            Err(CopyError::Read(e)) => {
                return self.fail(destination, TransferStatus::Failed, XferError::io(&source, e), Some(copied))
            }
            Err(CopyError::Write(e)) => {
                let cause = XferError::storage(format!("writing {}: {}", destination.id, e));
                return self.fail(destination, TransferStatus::Failed, cause, Some(copied));
            }
        };

        match writer.close() {
            Ok(committed) => UploadResult::success(
                self.file.clone(),
                committed,
                bytes,
                hasher.map(StreamingHasher::finalize),
            ),
            Err(e) if self.skips_on(&e) => {
                debug!("Skipping {}: {} appeared during upload", source.display(), destination.id);
                UploadResult::skipped(self.file.clone(), destination)
            }
            Err(e) => self.fail(destination, TransferStatus::Failed, e, Some(bytes)),
        }
    }

    fn abandon(&self, status: TransferStatus, cause: XferError) -> UploadResult {
        self.fail(self.reported_destination(), status, cause, None)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// A transfer waiting in the pool queue, bound to its job slot
pub(crate) struct Queued<T: Transfer> {
    transfer: T,
    slot: usize,
    sink: Arc<ResultSink<T::Output>>,
    progress: Option<ProgressReporter>,
}

impl<T: Transfer> Queued<T> {
    pub(crate) fn new(
        transfer: T,
        slot: usize,
        sink: Arc<ResultSink<T::Output>>,
        progress: Option<ProgressReporter>,
    ) -> Self {
        Self {
            transfer,
            slot,
            sink,
            progress,
        }
    }

    fn finish(self, result: T::Output) {
        let status = result.status();
        match (status, result.cause()) {
            (TransferStatus::Failed | TransferStatus::FailedToStart, Some(cause)) => {
                warn!("{} {}: {}", status, self.transfer.label(), cause)
            }
            _ => debug!("{} {}", status, self.transfer.label()),
        }

        if let Some(progress) = &self.progress {
            progress.record(status);
        }
        self.sink.deliver(self.slot, result);
    }
}

impl<T: Transfer> Runnable for Queued<T> {
    fn size_hint(&self) -> Option<u64> {
        self.transfer.size_hint()
    }

    fn is_cancelled(&self) -> bool {
        self.sink.is_cancelled()
    }

    fn run(self: Box<Self>, ctx: &mut WorkerContext) {
        let progress = self.progress.as_ref();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.transfer.execute(ctx, progress)));

        let result = match outcome {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!("Worker {} caught a panic in {}: {}", ctx.worker_id, self.transfer.label(), message);
                self.transfer.abandon(TransferStatus::Failed, XferError::Panicked(message))
            }
        };
        (*self).finish(result);
    }

    fn resolve(self: Box<Self>, status: TransferStatus, cause: XferError) {
        let result = self.transfer.abandon(status, cause);
        (*self).finish(result);
    }
}
