//! Progress reporter implementation
//!
//! Uses indicatif for progress bars with:
//! - Object count progress
//! - Byte transfer progress with throughput and ETA
//! - A status line tallying skipped and failed objects
//!
//! The reporter is cheap to clone; every worker ticks the same bars.

use crate::core::TransferStatus;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Inner {
    multi: MultiProgress,
    bytes_bar: ProgressBar,
    files_bar: ProgressBar,
    status: ProgressBar,
    start_time: Instant,
    total_bytes: AtomicU64,
    total_files: AtomicU64,
    bytes_transferred: AtomicU64,
    files_done: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
    enabled: AtomicBool,
}

/// Progress reporter shared by every worker of a transfer manager
#[derive(Clone)]
pub struct ProgressReporter {
    inner: Arc<Inner>,
}

fn style(template: &str, bar: bool) -> ProgressStyle {
    let base = if bar {
        ProgressStyle::default_bar()
    } else {
        ProgressStyle::default_spinner()
    };
    match base.clone().template(template) {
        Ok(styled) if bar => styled.progress_chars("=> "),
        Ok(styled) => styled,
        Err(_) => base,
    }
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let multi = MultiProgress::new();

        let status = multi.add(ProgressBar::new_spinner());
        status.set_style(style("{spinner:.cyan} {msg}", false));
        status.enable_steady_tick(Duration::from_millis(120));

        let files_bar = multi.add(ProgressBar::new(0));
        files_bar.set_style(style(
            "{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} objects ({percent}%)",
            true,
        ));
        files_bar.set_prefix("Items");

        let bytes_bar = multi.add(ProgressBar::new(0));
        bytes_bar.set_style(style(
            "{prefix:.bold.dim} [{bar:40.green/white}] {bytes}/{total_bytes} ({bytes_per_sec}, ETA {eta})",
            true,
        ));
        bytes_bar.set_prefix("Data ");

        Self {
            inner: Arc::new(Inner {
                multi,
                bytes_bar,
                files_bar,
                status,
                start_time: Instant::now(),
                total_bytes: AtomicU64::new(0),
                total_files: AtomicU64::new(0),
                bytes_transferred: AtomicU64::new(0),
                files_done: AtomicU64::new(0),
                skipped: AtomicU64::new(0),
                failed: AtomicU64::new(0),
                enabled: AtomicBool::new(true),
            }),
        }
    }

    /// Create a disabled progress reporter (for quiet mode and tests)
    pub fn disabled() -> Self {
        let reporter = Self::new();
        reporter.inner.enabled.store(false, Ordering::SeqCst);
        reporter.inner.status.disable_steady_tick();
        reporter.inner.multi.set_draw_target(ProgressDrawTarget::hidden());
        reporter
    }

    /// Grow the expected object count by `count`
    pub fn add_total_files(&self, count: u64) {
        let total = self.inner.total_files.fetch_add(count, Ordering::Relaxed) + count;
        self.inner.files_bar.set_length(total);
    }

    /// Grow the expected byte count by `bytes`
    pub fn add_total_bytes(&self, bytes: u64) {
        let total = self.inner.total_bytes.fetch_add(bytes, Ordering::Relaxed) + bytes;
        self.inner.bytes_bar.set_length(total);
    }

    /// Increment bytes transferred
    pub fn increment_bytes(&self, bytes: u64) {
        self.inner.bytes_transferred.fetch_add(bytes, Ordering::Relaxed);
        self.inner.bytes_bar.inc(bytes);
    }

    /// Count one resolved object
    pub fn record(&self, status: TransferStatus) {
        self.inner.files_done.fetch_add(1, Ordering::Relaxed);
        self.inner.files_bar.inc(1);

        match status {
            TransferStatus::Skipped => {
                self.inner.skipped.fetch_add(1, Ordering::Relaxed);
            }
            TransferStatus::Success => return,
            _ => {
                self.inner.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.inner.status.set_message(format!(
            "{} skipped, {} failed",
            self.inner.skipped.load(Ordering::Relaxed),
            self.inner.failed.load(Ordering::Relaxed)
        ));
    }

    /// Set current status message
    pub fn set_status(&self, msg: &str) {
        self.inner.status.set_message(msg.to_string());
    }

    /// Get elapsed time
    pub fn elapsed(&self) -> Duration {
        self.inner.start_time.elapsed()
    }

    /// Get current throughput in bytes/second
    pub fn throughput(&self) -> f64 {
        let bytes = self.inner.bytes_transferred.load(Ordering::Relaxed);
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            bytes as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Finish progress with a final message
    pub fn finish(&self, message: &str, success: bool) {
        let mark = if success { "✓" } else { "✗" };
        self.inner.status.finish_with_message(format!("{} {}", mark, message));
        if success {
            self.inner.files_bar.finish();
            self.inner.bytes_bar.finish();
        } else {
            self.inner.files_bar.abandon();
            self.inner.bytes_bar.abandon();
        }
    }

    /// Check if progress is enabled
    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::Relaxed)
    }

    /// Get progress summary
    pub fn summary(&self) -> ProgressSummary {
        ProgressSummary {
            total_bytes: self.inner.total_bytes.load(Ordering::Relaxed),
            bytes_transferred: self.inner.bytes_transferred.load(Ordering::Relaxed),
            total_files: self.inner.total_files.load(Ordering::Relaxed),
            files_done: self.inner.files_done.load(Ordering::Relaxed),
            skipped: self.inner.skipped.load(Ordering::Relaxed),
            failed: self.inner.failed.load(Ordering::Relaxed),
            elapsed: self.elapsed(),
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("summary", &self.summary())
            .finish()
    }
}

/// Progress summary
#[derive(Debug, Clone)]
pub struct ProgressSummary {
    /// Total bytes expected
    pub total_bytes: u64,
    /// Bytes transferred so far
    pub bytes_transferred: u64,
    /// Total objects expected
    pub total_files: u64,
    /// Objects resolved so far, whatever their status
    pub files_done: u64,
    /// Objects skipped
    pub skipped: u64,
    /// Objects that failed, failed to start or were cancelled
    pub failed: u64,
    /// Elapsed time
    pub elapsed: Duration,
}

impl ProgressSummary {
    /// Completion percentage by object count
    pub fn percentage(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            (self.files_done as f64 / self.total_files as f64) * 100.0
        }
    }
}
