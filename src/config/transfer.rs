//! Transfer manager configuration

use crate::config::HashAlgorithm;
use crate::error::{Result, XferError};
use crate::storage::StorageOptions;

/// Default bytes staged per in-flight transfer (16 MiB)
pub const DEFAULT_PER_WORKER_BUFFER_SIZE: usize = 16 * 1024 * 1024;

/// Immutable configuration of a [`TransferManager`](crate::core::TransferManager)
///
/// Peak staging memory is bounded by `max_workers * per_worker_buffer_size`.
#[derive(Debug, Clone)]
pub struct TransferManagerConfig {
    max_workers: usize,
    per_worker_buffer_size: usize,
    storage_options: StorageOptions,
    bandwidth_limit: Option<u64>,
    checksum: Option<HashAlgorithm>,
}

impl TransferManagerConfig {
    /// Start building a configuration
    pub fn builder() -> TransferManagerConfigBuilder {
        TransferManagerConfigBuilder::default()
    }

    /// Size of the worker pool
    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Bytes staged per in-flight transfer
    pub fn per_worker_buffer_size(&self) -> usize {
        self.per_worker_buffer_size
    }

    /// Storage client configuration
    pub fn storage_options(&self) -> &StorageOptions {
        &self.storage_options
    }

    /// Aggregate bandwidth limit in bytes per second
    pub fn bandwidth_limit(&self) -> Option<u64> {
        self.bandwidth_limit
    }

    /// Digest computed over transferred bytes
    pub fn checksum(&self) -> Option<HashAlgorithm> {
        self.checksum
    }
}

/// Builder for [`TransferManagerConfig`]
#[derive(Debug, Default)]
pub struct TransferManagerConfigBuilder {
    max_workers: Option<usize>,
    per_worker_buffer_size: Option<usize>,
    storage_options: Option<StorageOptions>,
    bandwidth_limit: Option<u64>,
    checksum: Option<HashAlgorithm>,
}

impl TransferManagerConfigBuilder {
    /// Size of the worker pool (default: twice the CPU count)
    pub fn max_workers(mut self, workers: usize) -> Self {
        self.max_workers = Some(workers);
        self
    }

    /// Bytes staged per in-flight transfer (default: 16 MiB)
    pub fn per_worker_buffer_size(mut self, bytes: usize) -> Self {
        self.per_worker_buffer_size = Some(bytes);
        self
    }

    /// Storage client configuration (required)
    pub fn storage_options(mut self, options: StorageOptions) -> Self {
        self.storage_options = Some(options);
        self
    }

    /// Aggregate bandwidth limit in bytes per second
    pub fn bandwidth_limit(mut self, bytes_per_second: Option<u64>) -> Self {
        self.bandwidth_limit = bytes_per_second;
        self
    }

    /// Digest to compute over transferred bytes
    pub fn checksum(mut self, algorithm: Option<HashAlgorithm>) -> Self {
        self.checksum = algorithm;
        self
    }

    /// Validate and build
    pub fn build(self) -> Result<TransferManagerConfig> {
        let max_workers = self.max_workers.unwrap_or_else(|| num_cpus::get() * 2);
        if max_workers == 0 {
            return Err(XferError::config("max_workers must be positive"));
        }

        let per_worker_buffer_size = self
            .per_worker_buffer_size
            .unwrap_or(DEFAULT_PER_WORKER_BUFFER_SIZE);
        if per_worker_buffer_size == 0 {
            return Err(XferError::config("per_worker_buffer_size must be positive"));
        }

        if self.bandwidth_limit == Some(0) {
            return Err(XferError::config("bandwidth_limit must be positive when set"));
        }

        let storage_options = self
            .storage_options
            .ok_or_else(|| XferError::config("storage_options is required"))?;

        Ok(TransferManagerConfig {
            max_workers,
            per_worker_buffer_size,
            storage_options,
            bandwidth_limit: self.bandwidth_limit,
            checksum: self.checksum,
        })
    }
}
