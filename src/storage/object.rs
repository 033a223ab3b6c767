//! Object identities and per-request options

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of an object in a bucket
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlobId {
    /// Bucket name
    pub bucket: String,
    /// Object name
    pub name: String,
    /// Specific generation, if pinned
    pub generation: Option<i64>,
}

impl BlobId {
    /// Create an id for the live generation of an object
    pub fn of(bucket: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            name: name.into(),
            generation: None,
        }
    }

    /// Pin the id to a generation
    pub fn with_generation(mut self, generation: i64) -> Self {
        self.generation = Some(generation);
        self
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gs://{}/{}", self.bucket, self.name)?;
        if let Some(generation) = self.generation {
            write!(f, "#{}", generation)?;
        }
        Ok(())
    }
}

/// Object metadata as known to the caller or reported by the store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlobInfo {
    /// Object identity
    pub id: BlobId,
    /// Size in bytes
    pub size: Option<u64>,
    /// Content type
    pub content_type: Option<String>,
    /// Metadata generation
    pub metageneration: Option<i64>,
}

impl BlobInfo {
    /// Create metadata carrying only an identity
    pub fn new(id: BlobId) -> Self {
        Self {
            id,
            size: None,
            content_type: None,
            metageneration: None,
        }
    }

    /// Shorthand for `BlobInfo::new(BlobId::of(bucket, name))`
    pub fn of(bucket: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(BlobId::of(bucket, name))
    }

    /// Object name
    pub fn name(&self) -> &str {
        &self.id.name
    }

    /// Bucket name
    pub fn bucket(&self) -> &str {
        &self.id.bucket
    }

    /// Set the size
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Set the content type
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

impl From<BlobId> for BlobInfo {
    fn from(id: BlobId) -> Self {
        Self::new(id)
    }
}

/// Options applied to each object read
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceOption {
    /// Read only if the live generation equals this value
    GenerationMatch(i64),
    /// Read only if the live generation differs from this value
    GenerationNotMatch(i64),
    /// Read only if the metageneration equals this value
    MetagenerationMatch(i64),
    /// Read only if the metageneration differs from this value
    MetagenerationNotMatch(i64),
    /// Project billed for the request
    UserProject(String),
}

/// Options applied to each object write
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetOption {
    /// Write only if no live object exists under the name
    DoesNotExist,
    /// Write only if the live generation equals this value
    GenerationMatch(i64),
    /// Write only if the metageneration equals this value
    MetagenerationMatch(i64),
    /// Project billed for the request
    UserProject(String),
    /// Content type recorded on the new object
    ContentType(String),
}
