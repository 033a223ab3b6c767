//! Streaming digests over transferred bytes
//!
//! Supports XXHash3 (ultra-fast), XXHash64, BLAKE3 and SHA-256. Transfers
//! feed each chunk into a [`StreamingHasher`] as it passes through the worker
//! buffer, so integrity reporting never costs a second read.

use crate::config::HashAlgorithm;
use crate::fs::HashWriter;
use serde::{Deserialize, Serialize};

/// Hash result as hex string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashResult {
    /// The hash algorithm used
    pub algorithm: HashAlgorithm,
    /// Hash value as lowercase hex string
    pub hash: String,
    /// Number of bytes hashed
    pub size: u64,
}

impl HashResult {
    /// Create a new hash result
    pub fn new(algorithm: HashAlgorithm, hash: String, size: u64) -> Self {
        Self { algorithm, hash, size }
    }

    /// Verify against another hash result
    pub fn verify(&self, other: &HashResult) -> bool {
        self.algorithm == other.algorithm && self.hash == other.hash
    }
}

impl std::fmt::Display for HashResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.algorithm.name(), self.hash)
    }
}

/// Unified hasher that supports all algorithms
pub enum Hasher {
    /// XXHash3 128-bit
    XXHash3(Box<xxhash_rust::xxh3::Xxh3>),
    /// XXHash64
    XXHash64(xxhash_rust::xxh64::Xxh64),
    /// BLAKE3
    Blake3(Box<blake3::Hasher>),
    /// SHA-256
    Sha256(sha2::Sha256),
}

impl Hasher {
    /// Create a new hasher for the given algorithm
    pub fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::XXHash3 => Self::XXHash3(Box::new(xxhash_rust::xxh3::Xxh3::new())),
            HashAlgorithm::XXHash64 => Self::XXHash64(xxhash_rust::xxh64::Xxh64::new(0)),
            HashAlgorithm::Blake3 => Self::Blake3(Box::new(blake3::Hasher::new())),
            HashAlgorithm::Sha256 => {
                use sha2::Digest;
                Self::Sha256(sha2::Sha256::new())
            }
        }
    }

    /// Get the algorithm this hasher uses
    pub fn algorithm(&self) -> HashAlgorithm {
        match self {
            Self::XXHash3(_) => HashAlgorithm::XXHash3,
            Self::XXHash64(_) => HashAlgorithm::XXHash64,
            Self::Blake3(_) => HashAlgorithm::Blake3,
            Self::Sha256(_) => HashAlgorithm::Sha256,
        }
    }

    /// Update the hasher with more data
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::XXHash3(h) => h.update(data),
            Self::XXHash64(h) => h.update(data),
            Self::Blake3(h) => {
                h.update(data);
            }
            Self::Sha256(h) => {
                use sha2::Digest;
                h.update(data);
            }
        }
    }

    /// Finalize and get the hash as hex string
    pub fn finalize(self) -> String {
        match self {
            Self::XXHash3(h) => format!("{:032x}", h.digest128()),
            Self::XXHash64(h) => format!("{:016x}", h.digest()),
            Self::Blake3(h) => h.finalize().to_hex().to_string(),
            Self::Sha256(h) => {
                use sha2::Digest;
                hex::encode(h.finalize())
            }
        }
    }
}

/// Hasher that also counts the bytes it has seen
pub struct StreamingHasher {
    hasher: Hasher,
    bytes_processed: u64,
}

impl StreamingHasher {
    /// Create a new streaming hasher
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self {
            hasher: Hasher::new(algorithm),
            bytes_processed: 0,
        }
    }

    /// Get bytes processed so far
    pub fn bytes_processed(&self) -> u64 {
        self.bytes_processed
    }

    /// Finalize and get the result
    pub fn finalize(self) -> HashResult {
        let algorithm = self.hasher.algorithm();
        HashResult::new(algorithm, self.hasher.finalize(), self.bytes_processed)
    }
}

impl HashWriter for StreamingHasher {
    fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.bytes_processed += data.len() as u64;
    }
}

/// Compute hash of data in memory
pub fn hash_bytes(data: &[u8], algorithm: HashAlgorithm) -> HashResult {
    let mut hasher = StreamingHasher::new(algorithm);
    hasher.update(data);
    hasher.finalize()
}
