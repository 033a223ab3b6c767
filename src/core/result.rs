//! Per-item transfer outcomes and batch summaries

use crate::error::XferError;
use crate::hash::HashResult;
use crate::storage::BlobInfo;
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// How a single item of a batch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferStatus {
    /// Every byte was transferred
    Success,
    /// Nothing was transferred; the item failed before its first byte
    FailedToStart,
    /// The transfer started and then failed; partial output may remain
    Failed,
    /// The destination already existed
    Skipped,
    /// The job was cancelled before the item started
    Cancelled,
}

impl TransferStatus {
    /// Every status that carries a cause
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::FailedToStart | Self::Failed | Self::Cancelled)
    }

    /// Upper-case name used in reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::FailedToStart => "FAILED_TO_START",
            Self::Failed => "FAILED",
            Self::Skipped => "SKIPPED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn serialize_cause<S>(cause: &Option<Arc<XferError>>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match cause {
        Some(cause) => serializer.serialize_some(&cause.to_string()),
        None => serializer.serialize_none(),
    }
}

/// Fields every result kind shares
pub trait TransferResult {
    /// Final status
    fn status(&self) -> TransferStatus;
    /// Why the item did not succeed; present exactly for failure statuses
    fn cause(&self) -> Option<&XferError>;
    /// Bytes moved, when any transfer was attempted
    fn bytes_transferred(&self) -> Option<u64>;
}

/// Outcome of downloading one object
#[derive(Debug, Clone, Serialize)]
pub struct DownloadResult {
    input: BlobInfo,
    output_destination: PathBuf,
    status: TransferStatus,
    #[serde(serialize_with = "serialize_cause")]
    cause: Option<Arc<XferError>>,
    bytes_transferred: Option<u64>,
    checksum: Option<HashResult>,
}

impl DownloadResult {
    pub(crate) fn success(
        input: BlobInfo,
        output_destination: PathBuf,
        bytes: u64,
        checksum: Option<HashResult>,
    ) -> Self {
        Self {
            input,
            output_destination,
            status: TransferStatus::Success,
            cause: None,
            bytes_transferred: Some(bytes),
            checksum,
        }
    }

    pub(crate) fn skipped(input: BlobInfo, output_destination: PathBuf) -> Self {
        Self {
            input,
            output_destination,
            status: TransferStatus::Skipped,
            cause: None,
            bytes_transferred: None,
            checksum: None,
        }
    }

    /// Failure outcome; `bytes` is what was written before the failure
    pub(crate) fn failure(
        input: BlobInfo,
        output_destination: PathBuf,
        status: TransferStatus,
        cause: XferError,
        bytes: Option<u64>,
    ) -> Self {
        debug_assert!(status.is_failure());
        Self {
            input,
            output_destination,
            status,
            cause: Some(Arc::new(cause)),
            bytes_transferred: bytes,
            checksum: None,
        }
    }

    /// The object that was requested
    pub fn input(&self) -> &BlobInfo {
        &self.input
    }

    /// Local file the object was (or would have been) written to
    pub fn output_destination(&self) -> &Path {
        &self.output_destination
    }

    /// Digest of the downloaded bytes, when checksums are enabled
    pub fn checksum(&self) -> Option<&HashResult> {
        self.checksum.as_ref()
    }
}

impl TransferResult for DownloadResult {
    fn status(&self) -> TransferStatus {
        self.status
    }

    fn cause(&self) -> Option<&XferError> {
        self.cause.as_deref()
    }

    fn bytes_transferred(&self) -> Option<u64> {
        self.bytes_transferred
    }
}

/// Outcome of uploading one local file
#[derive(Debug, Clone, Serialize)]
pub struct UploadResult {
    input: PathBuf,
    destination: BlobInfo,
    status: TransferStatus,
    #[serde(serialize_with = "serialize_cause")]
    cause: Option<Arc<XferError>>,
    bytes_transferred: Option<u64>,
    checksum: Option<HashResult>,
}

impl UploadResult {
    pub(crate) fn success(
        input: PathBuf,
        destination: BlobInfo,
        bytes: u64,
        checksum: Option<HashResult>,
    ) -> Self {
        Self {
            input,
            destination,
            status: TransferStatus::Success,
            cause: None,
            bytes_transferred: Some(bytes),
            checksum,
        }
    }

    pub(crate) fn skipped(input: PathBuf, destination: BlobInfo) -> Self {
        Self {
            input,
            destination,
            status: TransferStatus::Skipped,
            cause: None,
            bytes_transferred: None,
            checksum: None,
        }
    }

    pub(crate) fn failure(
        input: PathBuf,
        destination: BlobInfo,
        status: TransferStatus,
        cause: XferError,
        bytes: Option<u64>,
    ) -> Self {
        debug_assert!(status.is_failure());
        Self {
            input,
            destination,
            status,
            cause: Some(Arc::new(cause)),
            bytes_transferred: bytes,
            checksum: None,
        }
    }

    /// The local file that was requested
    pub fn input(&self) -> &Path {
        &self.input
    }

    /// Target object; carries generation and size once the upload succeeded
    pub fn destination(&self) -> &BlobInfo {
        &self.destination
    }

    /// Digest of the uploaded bytes, when checksums are enabled
    pub fn checksum(&self) -> Option<&HashResult> {
        self.checksum.as_ref()
    }
}

impl TransferResult for UploadResult {
    fn status(&self) -> TransferStatus {
        self.status
    }

    fn cause(&self) -> Option<&XferError> {
        self.cause.as_deref()
    }

    fn bytes_transferred(&self) -> Option<u64> {
        self.bytes_transferred
    }
}

/// Per-status counts for a list of results
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Items in the batch
    pub total: usize,
    /// Items transferred completely
    pub succeeded: usize,
    /// Items skipped because the destination existed
    pub skipped: usize,
    /// Items that failed before transferring anything
    pub failed_to_start: usize,
    /// Items that failed mid-transfer
    pub failed: usize,
    /// Items never started because the job was cancelled
    pub cancelled: usize,
    /// Bytes moved across all items, including partial transfers
    pub bytes_transferred: u64,
    /// Wall-clock time of the batch, when measured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed: Option<Duration>,
}

impl BatchSummary {
    /// Tally a list of results
    pub fn from_results<R: TransferResult>(results: &[R]) -> Self {
        let mut summary = Self {
            total: results.len(),
            ..Default::default()
        };

        for result in results {
            match result.status() {
                TransferStatus::Success => summary.succeeded += 1,
                TransferStatus::Skipped => summary.skipped += 1,
                TransferStatus::FailedToStart => summary.failed_to_start += 1,
                TransferStatus::Failed => summary.failed += 1,
                TransferStatus::Cancelled => summary.cancelled += 1,
            }
            summary.bytes_transferred += result.bytes_transferred().unwrap_or(0);
        }

        summary
    }

    /// Record how long the batch took
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = Some(elapsed);
        self
    }

    /// True when no item failed, failed to start, or was cancelled
    pub fn is_success(&self) -> bool {
        self.failed_to_start + self.failed + self.cancelled == 0
    }

    /// Print summary to console
    pub fn print_summary(&self) {
        println!("\n=== Transfer Summary ===");
        println!("Objects:         {}", self.total);
        println!("Succeeded:       {}", self.succeeded);
        println!("Skipped:         {}", self.skipped);
        println!("Failed to start: {}", self.failed_to_start);
        println!("Failed:          {}", self.failed);
        if self.cancelled > 0 {
            println!("Cancelled:       {}", self.cancelled);
        }
        println!("Transferred:     {}", humansize::format_size(self.bytes_transferred, humansize::BINARY));

        if let Some(elapsed) = self.elapsed {
            println!("Duration:        {:.2?}", elapsed);
            let secs = elapsed.as_secs_f64();
            if secs > 0.0 {
                let throughput = (self.bytes_transferred as f64 / secs) as u64;
                println!("Throughput:      {}/s", humansize::format_size(throughput, humansize::BINARY));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(name: &str) -> BlobInfo {
        BlobInfo::of("bucket", name)
    }

    #[test]
    fn test_cause_present_only_on_failure() {
        let ok = DownloadResult::success(blob("a"), PathBuf::from("/d/a"), 10, None);
        assert!(ok.cause().is_none());
        assert_eq!(ok.bytes_transferred(), Some(10));

        let skipped = DownloadResult::skipped(blob("b"), PathBuf::from("/d/b"));
        assert!(skipped.cause().is_none());
        assert_eq!(skipped.bytes_transferred(), None);

        let failed = DownloadResult::failure(
            blob("c"),
            PathBuf::from("/d/c"),
            TransferStatus::FailedToStart,
            XferError::storage("Reader called"),
            None,
        );
        assert_eq!(failed.status(), TransferStatus::FailedToStart);
        assert!(failed.cause().unwrap().to_string().contains("Reader called"));
    }

    #[test]
    fn test_results_clone_share_cause() {
        let failed = UploadResult::failure(
            PathBuf::from("/src/a"),
            blob("a"),
            TransferStatus::Failed,
            XferError::storage("close failed"),
            Some(3),
        );
        let copy = failed.clone();
        assert!(std::ptr::eq(failed.cause().unwrap(), copy.cause().unwrap()));
    }

    #[test]
    fn test_result_serializes_cause_as_text() {
        let failed = DownloadResult::failure(
            blob("a"),
            PathBuf::from("/d/a"),
            TransferStatus::Failed,
            XferError::storage("stream reset"),
            Some(5),
        );
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["status"], "FAILED");
        assert_eq!(json["cause"], "Storage error: stream reset");
        assert_eq!(json["bytes_transferred"], 5);
    }

    #[test]
    fn test_batch_summary() {
        let results = vec![
            DownloadResult::success(blob("a"), PathBuf::from("/d/a"), 100, None),
            DownloadResult::skipped(blob("b"), PathBuf::from("/d/b")),
            DownloadResult::failure(
                blob("c"),
                PathBuf::from("/d/c"),
                TransferStatus::Failed,
                XferError::storage("reset"),
                Some(40),
            ),
            DownloadResult::failure(
                blob("d"),
                PathBuf::from("/d/d"),
                TransferStatus::Cancelled,
                XferError::Cancelled,
                None,
            ),
        ];

        let summary = BatchSummary::from_results(&results);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.cancelled, 1);
        assert_eq!(summary.bytes_transferred, 140);
        assert!(!summary.is_success());

        assert!(BatchSummary::from_results::<DownloadResult>(&[]).is_success());
    }
}
