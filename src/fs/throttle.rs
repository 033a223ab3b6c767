//! Bandwidth throttling for controlled transfer rates
//!
//! Token-bucket rate limiting via the Governor crate. One limiter is shared
//! by every worker, so the configured rate caps the aggregate throughput of
//! the whole pool rather than each transfer.

use governor::{clock::DefaultClock, state::{InMemoryState, NotKeyed}, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// Bandwidth limiter for controlling transfer rates
#[derive(Clone)]
pub struct BandwidthLimiter {
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    bytes_per_token: usize,
}

impl BandwidthLimiter {
    /// Create a new bandwidth limiter
    ///
    /// # Example
    /// ```
    /// use bulkxfer::fs::BandwidthLimiter;
    /// let limiter = BandwidthLimiter::new(100 * 1024 * 1024); // 100 MB/s
    /// ```
    pub fn new(bytes_per_second: u64) -> Self {
        // 4KB tokens keep per-chunk accounting cheap for large buffers
        const BYTES_PER_TOKEN: usize = 4096;

        let tokens_per_second = (bytes_per_second as usize / BYTES_PER_TOKEN).max(1);
        let capped_tokens = tokens_per_second.min(u32::MAX as usize) as u32;
        let quota = Quota::per_second(NonZeroU32::new(capped_tokens).unwrap_or(NonZeroU32::MIN));

        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
            bytes_per_token: BYTES_PER_TOKEN,
        }
    }

    /// Block until the given number of bytes may be transferred
    pub fn wait_for_capacity_blocking(&self, bytes: usize) {
        let tokens_needed = (bytes / self.bytes_per_token).max(1);

        for _ in 0..tokens_needed {
            while self.limiter.check().is_err() {
                std::thread::sleep(Duration::from_micros(100));
            }
        }
    }
}

impl std::fmt::Debug for BandwidthLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BandwidthLimiter")
            .field("bytes_per_token", &self.bytes_per_token)
            .finish_non_exhaustive()
    }
}
