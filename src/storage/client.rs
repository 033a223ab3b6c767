//! Storage collaborator capability
//!
//! The transfer manager never speaks a wire protocol itself. It consumes an
//! already-authenticated [`ObjectStorage`] built from [`StorageOptions`] and
//! shares it read-only across every worker.

use crate::error::{Result, XferError};
use crate::storage::{BlobId, BlobInfo, LocalObjectStorage, SourceOption, TargetOption};
use std::fmt;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

/// A writable object stream
///
/// Bytes written are not visible in the bucket until [`ObjectWriter::close`]
/// succeeds. Dropping a writer without closing it abandons the upload.
pub trait ObjectWriter: Write + Send {
    /// Flush and commit the object, returning its final metadata
    fn close(self: Box<Self>) -> Result<BlobInfo>;
}

/// Object-storage client capability used by transfer tasks
pub trait ObjectStorage: Send + Sync {
    /// Open a readable stream over an object's content
    fn reader(&self, id: &BlobId, options: &[SourceOption]) -> Result<Box<dyn Read + Send>>;

    /// Open a writable stream that creates or replaces an object
    fn writer(&self, info: &BlobInfo, options: &[TargetOption]) -> Result<Box<dyn ObjectWriter>>;

    /// List objects in a bucket whose names start with `prefix`
    fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<BlobInfo>> {
        let _ = (bucket, prefix);
        Err(XferError::Unsupported("listing objects".to_string()))
    }
}

/// Builds the storage client from its options
pub trait StorageFactory: Send + Sync {
    /// Construct a client
    fn create(&self, options: &StorageOptions) -> Result<Arc<dyn ObjectStorage>>;
}

impl<F> StorageFactory for F
where
    F: Fn(&StorageOptions) -> Result<Arc<dyn ObjectStorage>> + Send + Sync,
{
    fn create(&self, options: &StorageOptions) -> Result<Arc<dyn ObjectStorage>> {
        self(options)
    }
}

/// Storage client configuration
#[derive(Clone)]
pub struct StorageOptions {
    project_id: Option<String>,
    factory: Arc<dyn StorageFactory>,
}

impl StorageOptions {
    /// Create options from a client factory
    pub fn new(factory: impl StorageFactory + 'static) -> Self {
        Self {
            project_id: None,
            factory: Arc::new(factory),
        }
    }

    /// Options that always hand out the given client
    pub fn with_client(client: Arc<dyn ObjectStorage>) -> Self {
        Self::new(move |_: &StorageOptions| -> Result<Arc<dyn ObjectStorage>> {
            Ok(Arc::clone(&client))
        })
    }

    /// Options for a filesystem-backed store rooted at `root`
    pub fn local(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self::new(move |_: &StorageOptions| -> Result<Arc<dyn ObjectStorage>> {
            Ok(Arc::new(LocalObjectStorage::new(root.clone())?))
        })
    }

    /// Set the project id
    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Project id, if set
    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    /// Build the storage client
    pub fn service(&self) -> Result<Arc<dyn ObjectStorage>> {
        self.factory.create(self)
    }
}

impl fmt::Debug for StorageOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageOptions")
            .field("project_id", &self.project_id)
            .finish_non_exhaustive()
    }
}
