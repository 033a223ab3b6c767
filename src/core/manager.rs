//! Transfer manager
//!
//! Entry point of the library: owns the storage client and the worker pool,
//! and turns a batch of objects or files into a running job.

use crate::config::{ParallelDownloadConfig, ParallelUploadConfig, TransferManagerConfig};
use crate::core::job::{DownloadJob, JobHandle, UploadJob};
use crate::core::pool::WorkerPool;
use crate::core::qos::{NoopQos, Qos};
use crate::core::task::{DownloadTransfer, Queued, UploadTransfer};
use crate::error::Result;
use crate::progress::ProgressReporter;
use crate::storage::BlobInfo;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Runs batches of downloads and uploads on a bounded worker pool
///
/// Submitting returns at once with a job handle; per-item failures are
/// reported in the job's results and never abort the rest of the batch.
///
/// # Example
/// ```no_run
/// use bulkxfer::config::{ParallelDownloadConfig, TransferManagerConfig};
/// use bulkxfer::core::TransferManager;
/// use bulkxfer::storage::{BlobInfo, StorageOptions};
///
/// let config = TransferManagerConfig::builder()
///     .max_workers(8)
///     .storage_options(StorageOptions::local("/srv/store"))
///     .build()?;
/// let manager = TransferManager::new(config)?;
///
/// let download = ParallelDownloadConfig::builder()
///     .bucket_name("photos")
///     .download_directory("./photos")
///     .skip_if_exists(true)
///     .build()?;
/// let job = manager.download_blobs(vec![BlobInfo::of("photos", "a.jpg")], &download);
/// for result in job.download_results()? {
///     println!("{:?}", result);
/// }
/// # Ok::<(), bulkxfer::error::XferError>(())
/// ```
pub struct TransferManager {
    config: TransferManagerConfig,
    pool: WorkerPool,
    progress: Option<ProgressReporter>,
}

impl TransferManager {
    /// Create a manager that admits every task
    pub fn new(config: TransferManagerConfig) -> Result<Self> {
        Self::with_qos(config, Arc::new(NoopQos))
    }

    /// Create a manager whose workers ask `qos` before starting each task
    pub fn with_qos(config: TransferManagerConfig, qos: Arc<dyn Qos>) -> Result<Self> {
        let storage = config.storage_options().service()?;
        let pool = WorkerPool::new(&config, storage, qos)?;
        Ok(Self {
            config,
            pool,
            progress: None,
        })
    }

    /// Report every submitted item to `reporter`
    pub fn with_progress(mut self, reporter: ProgressReporter) -> Self {
        self.progress = Some(reporter);
        self
    }

    /// The configuration this manager was built with
    pub fn config(&self) -> &TransferManagerConfig {
        &self.config
    }

    /// Tasks running right now
    pub fn in_flight(&self) -> usize {
        self.pool.in_flight()
    }

    /// Whether [`close`](Self::close) was called
    pub fn is_closed(&self) -> bool {
        !self.pool.is_open()
    }

    /// Download every object into `config.download_directory()`
    ///
    /// Objects are read from `config.bucket_name()`; the bucket of each
    /// item is ignored.
    pub fn download_blobs(
        &self,
        items: impl IntoIterator<Item = BlobInfo>,
        config: &ParallelDownloadConfig,
    ) -> DownloadJob {
        let items: Vec<BlobInfo> = items.into_iter().collect();
        let (job, sink) = JobHandle::new(items.len());
        let config = Arc::new(config.clone());

        info!(
            "Submitting {} downloads from gs://{} to {}",
            items.len(),
            config.bucket_name(),
            config.download_directory().display()
        );
        if let Some(progress) = &self.progress {
            progress.add_total_files(items.len() as u64);
            progress.add_total_bytes(items.iter().filter_map(|blob| blob.size).sum());
        }

        for (slot, blob) in items.into_iter().enumerate() {
            let transfer = DownloadTransfer::new(blob, Arc::clone(&config));
            self.pool.submit(Box::new(Queued::new(
                transfer,
                slot,
                Arc::clone(&sink),
                self.progress.clone(),
            )));
        }
        job
    }

    /// Upload every file into `config.bucket_name()`
    pub fn upload_files(
        &self,
        items: impl IntoIterator<Item = PathBuf>,
        config: &ParallelUploadConfig,
    ) -> UploadJob {
        let items: Vec<PathBuf> = items.into_iter().collect();
        let (job, sink) = JobHandle::new(items.len());
        let config = Arc::new(config.clone());

        info!("Submitting {} uploads to gs://{}", items.len(), config.bucket_name());
        if let Some(progress) = &self.progress {
            progress.add_total_files(items.len() as u64);
        }

        for (slot, file) in items.into_iter().enumerate() {
            let transfer = UploadTransfer::new(file, Arc::clone(&config));
            self.pool.submit(Box::new(Queued::new(
                transfer,
                slot,
                Arc::clone(&sink),
                self.progress.clone(),
            )));
        }
        job
    }

    /// Stop accepting work, finish everything already queued, join workers
    ///
    /// Later submissions resolve every item as failed-to-start.
    pub fn close(&mut self) {
        self.pool.shutdown();
    }
}

impl std::fmt::Debug for TransferManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferManager")
            .field("config", &self.config)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HashAlgorithm, PrefixMismatch};
    use crate::core::qos::{Admission, AdmissionContext, MemoryBudgetQos};
    use crate::core::{BatchSummary, TransferResult, TransferStatus};
    use crate::error::XferError;
    use crate::storage::testing::{Fault, MemoryStorage};
    use crate::storage::{LocalObjectStorage, ObjectStorage, StorageOptions};
    use std::collections::HashSet;
    use std::time::Duration;
    use tempfile::TempDir;

    fn manager(storage: &MemoryStorage, workers: usize) -> TransferManager {
        let config = TransferManagerConfig::builder()
            .max_workers(workers)
            .per_worker_buffer_size(64)
            .storage_options(StorageOptions::with_client(Arc::new(storage.clone())))
            .build()
            .unwrap();
        TransferManager::new(config).unwrap()
    }

    fn download_config(dir: &std::path::Path) -> ParallelDownloadConfig {
        ParallelDownloadConfig::builder()
            .bucket_name("bucket")
            .download_directory(dir)
            .build()
            .unwrap()
    }

    fn seed(storage: &MemoryStorage, count: usize, size: usize) -> Vec<BlobInfo> {
        (0..count)
            .map(|i| {
                let name = format!("obj-{:03}", i);
                storage.insert("bucket", &name, &vec![i as u8; size]);
                BlobInfo::of("bucket", name).with_size(size as u64)
            })
            .collect()
    }

    #[test]
    fn test_one_result_per_item_in_order() {
        let dir = TempDir::new().unwrap();
        let storage = MemoryStorage::new();
        let blobs = seed(&storage, 20, 300);

        let job = manager(&storage, 4).download_blobs(blobs.clone(), &download_config(dir.path()));
        let results = job.download_results().unwrap();

        assert_eq!(results.len(), 20);
        let names: Vec<&str> = results.iter().map(|r| r.input().name()).collect();
        let expected: Vec<&str> = blobs.iter().map(|b| b.name()).collect();
        assert_eq!(names, expected);
        let distinct: HashSet<&str> = names.iter().copied().collect();
        assert_eq!(distinct.len(), 20);
        assert!(results.iter().all(|r| r.status() == TransferStatus::Success));
        assert_eq!(BatchSummary::from_results(&results).bytes_transferred, 20 * 300);
    }

    #[test]
    fn test_results_are_idempotent() {
        let dir = TempDir::new().unwrap();
        let storage = MemoryStorage::new();
        let blobs = seed(&storage, 3, 10);

        let job = manager(&storage, 2).download_blobs(blobs, &download_config(dir.path()));
        let first = job.download_results().unwrap();
        let second = job.download_results().unwrap();

        let statuses = |rs: &[crate::core::DownloadResult]| rs.iter().map(|r| r.status()).collect::<Vec<_>>();
        assert_eq!(statuses(&first), statuses(&second));
        assert!(job.is_done());
    }

    #[test]
    fn test_skip_existing_destination() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("blob.txt"), b"already here").unwrap();
        let storage = MemoryStorage::new().with_fault(Fault::OpenReader("Reader called".into()));

        let config = ParallelDownloadConfig::builder()
            .bucket_name("bucket")
            .download_directory(dir.path())
            .skip_if_exists(true)
            .build()
            .unwrap();
        let job = manager(&storage, 2).download_blobs(vec![BlobInfo::of("bucket", "blob.txt")], &config);
        let results = job.download_results().unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status(), TransferStatus::Skipped);
        assert_eq!(results[0].output_destination(), dir.path().join("blob.txt"));
        assert_eq!(storage.reader_calls(), 0);
    }

    #[test]
    fn test_reader_failure_reported_as_failed_to_start() {
        let dir = TempDir::new().unwrap();
        let storage = MemoryStorage::new().with_fault(Fault::OpenReader("Reader called".into()));

        let config = ParallelDownloadConfig::builder()
            .bucket_name("bucket")
            .download_directory(dir.path())
            .skip_if_exists(true)
            .build()
            .unwrap();
        let job = manager(&storage, 2).download_blobs(vec![BlobInfo::of("bucket", "blob.txt")], &config);
        let results = job.download_results().unwrap();

        assert_eq!(results[0].status(), TransferStatus::FailedToStart);
        assert!(results[0].cause().unwrap().to_string().contains("Reader called"));
    }

    #[test]
    fn test_concurrency_bounded_by_workers() {
        let dir = TempDir::new().unwrap();
        let storage = MemoryStorage::new().with_read_delay(Duration::from_millis(50));
        let blobs = seed(&storage, 9, 32);

        let job = manager(&storage, 3).download_blobs(blobs, &download_config(dir.path()));
        let results = job.download_results().unwrap();

        assert!(results.iter().all(|r| r.status() == TransferStatus::Success));
        // Every slot gets used and none beyond
        assert_eq!(storage.peak_concurrency(), 3);
    }

    #[test]
    fn test_panic_isolated_to_one_item() {
        let dir = TempDir::new().unwrap();
        let storage = MemoryStorage::new().with_fault(Fault::PanicOn("b".into()));
        for name in ["a", "b", "c"] {
            storage.insert("bucket", name, b"data");
        }
        let blobs = ["a", "b", "c"].map(|n| BlobInfo::of("bucket", n));

        let job = manager(&storage, 1).download_blobs(blobs, &download_config(dir.path()));
        let results = job.download_results().unwrap();

        assert_eq!(results[0].status(), TransferStatus::Success);
        assert_eq!(results[1].status(), TransferStatus::Failed);
        assert!(matches!(results[1].cause(), Some(XferError::Panicked(m)) if m.contains("reader exploded")));
        assert_eq!(results[2].status(), TransferStatus::Success);
    }

    #[test]
    fn test_cancel_stops_unstarted_items() {
        let dir = TempDir::new().unwrap();
        let storage = MemoryStorage::new().with_read_delay(Duration::from_millis(20));
        let blobs = seed(&storage, 5, 1024);

        let job = manager(&storage, 1).download_blobs(blobs, &download_config(dir.path()));
        job.cancel();
        let results = job.download_results().unwrap();

        let cancelled = results.iter().filter(|r| r.status() == TransferStatus::Cancelled).count();
        let succeeded = results.iter().filter(|r| r.status() == TransferStatus::Success).count();
        assert_eq!(cancelled + succeeded, 5);
        assert!(cancelled >= 4);
        assert_eq!(results[4].status(), TransferStatus::Cancelled);
        assert!(matches!(results[4].cause(), Some(XferError::Cancelled)));
    }

    struct RejectLarge;

    impl Qos for RejectLarge {
        fn admit(&self, ctx: &AdmissionContext) -> Admission {
            match ctx.object_size {
                Some(size) if size > 100 => Admission::Reject(format!("{} bytes is too large", size)),
                _ => Admission::Admit,
            }
        }
    }

    #[test]
    fn test_qos_reject_is_failed_to_start() {
        let dir = TempDir::new().unwrap();
        let storage = MemoryStorage::new();
        storage.insert("bucket", "small", &[1u8; 10]);
        storage.insert("bucket", "large", &[1u8; 1000]);
        let blobs = vec![
            BlobInfo::of("bucket", "small").with_size(10),
            BlobInfo::of("bucket", "large").with_size(1000),
        ];

        let config = TransferManagerConfig::builder()
            .max_workers(2)
            .per_worker_buffer_size(64)
            .storage_options(StorageOptions::with_client(Arc::new(storage.clone())))
            .build()
            .unwrap();
        let manager = TransferManager::with_qos(config, Arc::new(RejectLarge)).unwrap();
        let results = manager
            .download_blobs(blobs, &download_config(dir.path()))
            .download_results()
            .unwrap();

        assert_eq!(results[0].status(), TransferStatus::Success);
        assert_eq!(results[1].status(), TransferStatus::FailedToStart);
        assert!(matches!(results[1].cause(), Some(XferError::Rejected(_))));
        assert_eq!(storage.reader_calls(), 1);
    }

    #[test]
    fn test_memory_budget_qos_completes_batch() {
        let dir = TempDir::new().unwrap();
        let storage = MemoryStorage::new().with_read_delay(Duration::from_millis(10));
        let blobs = seed(&storage, 16, 256);

        let config = TransferManagerConfig::builder()
            .max_workers(8)
            .per_worker_buffer_size(64)
            .storage_options(StorageOptions::with_client(Arc::new(storage.clone())))
            .build()
            .unwrap();
        let manager = TransferManager::with_qos(config, Arc::new(MemoryBudgetQos::new(128))).unwrap();
        let results = manager
            .download_blobs(blobs, &download_config(dir.path()))
            .download_results()
            .unwrap();

        assert!(results.iter().all(|r| r.status() == TransferStatus::Success));
        // Two 64 byte buffers fit the budget, however many workers race the gate
        assert!(storage.peak_concurrency() <= 2, "peak {}", storage.peak_concurrency());
    }

    #[test]
    fn test_empty_batch() {
        let dir = TempDir::new().unwrap();
        let storage = MemoryStorage::new();

        let job = manager(&storage, 2).download_blobs(Vec::new(), &download_config(dir.path()));
        assert!(job.is_empty());
        assert!(job.download_results().unwrap().is_empty());
    }

    #[test]
    fn test_submit_after_close() {
        let dir = TempDir::new().unwrap();
        let storage = MemoryStorage::new();
        let blobs = seed(&storage, 2, 10);

        let mut manager = manager(&storage, 2);
        manager.close();
        assert!(manager.is_closed());

        let results = manager
            .download_blobs(blobs, &download_config(dir.path()))
            .download_results()
            .unwrap();
        assert!(results.iter().all(|r| r.status() == TransferStatus::FailedToStart));
        assert!(matches!(results[0].cause(), Some(XferError::PoolShutdown)));
        assert_eq!(storage.reader_calls(), 0);
    }

    #[test]
    fn test_drop_drains_queued_work() {
        let dir = TempDir::new().unwrap();
        let storage = MemoryStorage::new();
        let blobs = seed(&storage, 10, 100);

        let job = {
            let manager = manager(&storage, 2);
            manager.download_blobs(blobs, &download_config(dir.path()))
        };

        let results = job.download_results().unwrap();
        assert!(results.iter().all(|r| r.status() == TransferStatus::Success));
    }

    #[test]
    fn test_strict_prefix_fails_mismatched_names() {
        let dir = TempDir::new().unwrap();
        let storage = MemoryStorage::new();
        storage.insert("bucket", "logs/a.txt", b"a");
        storage.insert("bucket", "other/b.txt", b"b");

        let config = ParallelDownloadConfig::builder()
            .bucket_name("bucket")
            .download_directory(dir.path())
            .strip_prefix("logs/")
            .prefix_mismatch(PrefixMismatch::Fail)
            .build()
            .unwrap();
        let blobs = vec![BlobInfo::of("bucket", "logs/a.txt"), BlobInfo::of("bucket", "other/b.txt")];
        let results = manager(&storage, 2).download_blobs(blobs, &config).download_results().unwrap();

        assert_eq!(results[0].status(), TransferStatus::Success);
        assert_eq!(results[0].output_destination(), dir.path().join("a.txt"));
        assert_eq!(results[1].status(), TransferStatus::FailedToStart);
        assert_eq!(storage.reader_calls(), 1);
    }

    #[test]
    fn test_progress_counts_items() {
        let dir = TempDir::new().unwrap();
        let storage = MemoryStorage::new();
        let blobs = seed(&storage, 4, 100);
        let reporter = ProgressReporter::disabled();

        let manager = manager(&storage, 2).with_progress(reporter.clone());
        manager
            .download_blobs(blobs, &download_config(dir.path()))
            .download_results()
            .unwrap();

        let summary = reporter.summary();
        assert_eq!(summary.total_files, 4);
        assert_eq!(summary.files_done, 4);
        assert_eq!(summary.total_bytes, 400);
        assert_eq!(summary.bytes_transferred, 400);
    }

    #[test]
    fn test_local_store_round_trip() {
        let store = TempDir::new().unwrap();
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        std::fs::create_dir_all(src.path().join("deep/er")).unwrap();
        std::fs::write(src.path().join("top.txt"), b"top level").unwrap();
        std::fs::write(src.path().join("deep/er/leaf.bin"), vec![9u8; 5000]).unwrap();

        let local = LocalObjectStorage::new(store.path()).unwrap();
        local.create_bucket("backups").unwrap();

        let config = TransferManagerConfig::builder()
            .max_workers(2)
            .per_worker_buffer_size(1024)
            .storage_options(StorageOptions::local(store.path()))
            .checksum(Some(HashAlgorithm::XXHash64))
            .build()
            .unwrap();
        let manager = TransferManager::new(config).unwrap();

        let upload = ParallelUploadConfig::builder()
            .bucket_name("backups")
            .upload_directory(src.path())
            .prefix("nightly/")
            .build()
            .unwrap();
        let uploaded = manager
            .upload_files(vec![PathBuf::from("top.txt"), PathBuf::from("deep/er/leaf.bin")], &upload)
            .upload_results()
            .unwrap();
        assert!(uploaded.iter().all(|r| r.status() == TransferStatus::Success));
        assert_eq!(uploaded[1].destination().name(), "nightly/deep/er/leaf.bin");

        let listed = local.list("backups", "nightly/").unwrap();
        assert_eq!(listed.len(), 2);

        let download = ParallelDownloadConfig::builder()
            .bucket_name("backups")
            .download_directory(dst.path())
            .strip_prefix("nightly/")
            .build()
            .unwrap();
        let downloaded = manager.download_blobs(listed, &download).download_results().unwrap();
        assert!(downloaded.iter().all(|r| r.status() == TransferStatus::Success));
        assert_eq!(std::fs::read(dst.path().join("top.txt")).unwrap(), b"top level");
        assert_eq!(std::fs::read(dst.path().join("deep/er/leaf.bin")).unwrap(), vec![9u8; 5000]);

        let upload_sum = uploaded[1].checksum().unwrap();
        let download_sum = downloaded
            .iter()
            .find(|r| r.input().name() == "nightly/deep/er/leaf.bin")
            .and_then(|r| r.checksum())
            .unwrap();
        assert!(upload_sum.verify(download_sum));
    }
}
