//! Per-batch job descriptors
//!
//! Both descriptors are immutable value types with structural equality and
//! hashing over every field. Directories are made absolute once, at build
//! time, so two descriptors built from `downloads` and `$PWD/downloads`
//! compare equal.

use crate::error::{IoResultExt, Result, XferError};
use crate::fs::{object_name_for, strip_object_prefix};
use crate::storage::{BlobInfo, SourceOption, TargetOption};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What to do when `strip_prefix` does not match the start of an object name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PrefixMismatch {
    /// Use the object name unchanged
    #[default]
    Keep,
    /// Resolve the item as failed-to-start
    Fail,
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).with_path(path)
}

fn require_bucket(bucket: Option<String>) -> Result<String> {
    match bucket {
        Some(b) if !b.is_empty() => Ok(b),
        Some(_) => Err(XferError::config("bucket_name must not be empty")),
        None => Err(XferError::config("bucket_name is required")),
    }
}

/// Descriptor for one parallel download batch
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParallelDownloadConfig {
    bucket_name: String,
    strip_prefix: String,
    download_directory: PathBuf,
    options_per_request: Vec<SourceOption>,
    skip_if_exists: bool,
    prefix_mismatch: PrefixMismatch,
}

impl ParallelDownloadConfig {
    /// Start building a descriptor
    pub fn builder() -> ParallelDownloadConfigBuilder {
        ParallelDownloadConfigBuilder::default()
    }

    /// Bucket every object is read from
    pub fn bucket_name(&self) -> &str {
        &self.bucket_name
    }

    /// Prefix removed from object names when mapping to local paths
    pub fn strip_prefix(&self) -> &str {
        &self.strip_prefix
    }

    /// Absolute local directory receiving the objects
    pub fn download_directory(&self) -> &Path {
        &self.download_directory
    }

    /// Options applied to every read
    pub fn options_per_request(&self) -> &[SourceOption] {
        &self.options_per_request
    }

    /// Whether existing local files are left alone
    pub fn skip_if_exists(&self) -> bool {
        self.skip_if_exists
    }

    /// Policy for names not starting with `strip_prefix`
    pub fn prefix_mismatch(&self) -> PrefixMismatch {
        self.prefix_mismatch
    }

    /// Local path an object is written to
    pub fn destination_for(&self, blob: &BlobInfo) -> Result<PathBuf> {
        let relative = strip_object_prefix(blob.name(), &self.strip_prefix, self.prefix_mismatch)?;
        Ok(self.download_directory.join(relative))
    }
}

/// Builder for [`ParallelDownloadConfig`]
#[derive(Debug, Default, Clone)]
pub struct ParallelDownloadConfigBuilder {
    bucket_name: Option<String>,
    strip_prefix: String,
    download_directory: Option<PathBuf>,
    options_per_request: Vec<SourceOption>,
    skip_if_exists: bool,
    prefix_mismatch: PrefixMismatch,
}

impl ParallelDownloadConfigBuilder {
    /// Bucket to read from (required, non-empty)
    pub fn bucket_name(mut self, bucket: impl Into<String>) -> Self {
        self.bucket_name = Some(bucket.into());
        self
    }

    /// Prefix to remove from object names
    pub fn strip_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.strip_prefix = prefix.into();
        self
    }

    /// Local directory (default: current directory)
    pub fn download_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_directory = Some(dir.into());
        self
    }

    /// Options applied to every read
    pub fn options_per_request(mut self, options: Vec<SourceOption>) -> Self {
        self.options_per_request = options;
        self
    }

    /// Skip objects whose destination already exists (default: false)
    pub fn skip_if_exists(mut self, skip: bool) -> Self {
        self.skip_if_exists = skip;
        self
    }

    /// Policy for names not starting with the strip prefix
    pub fn prefix_mismatch(mut self, policy: PrefixMismatch) -> Self {
        self.prefix_mismatch = policy;
        self
    }

    /// Validate and build
    pub fn build(self) -> Result<ParallelDownloadConfig> {
        let bucket_name = require_bucket(self.bucket_name)?;
        let download_directory = absolute(
            self.download_directory
                .as_deref()
                .unwrap_or_else(|| Path::new(".")),
        )?;

        Ok(ParallelDownloadConfig {
            bucket_name,
            strip_prefix: self.strip_prefix,
            download_directory,
            options_per_request: self.options_per_request,
            skip_if_exists: self.skip_if_exists,
            prefix_mismatch: self.prefix_mismatch,
        })
    }
}

/// Descriptor for one parallel upload batch
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParallelUploadConfig {
    bucket_name: String,
    upload_directory: Option<PathBuf>,
    prefix: String,
    options_per_request: Vec<TargetOption>,
    skip_if_exists: bool,
}

impl ParallelUploadConfig {
    /// Start building a descriptor
    pub fn builder() -> ParallelUploadConfigBuilder {
        ParallelUploadConfigBuilder::default()
    }

    /// Bucket every file is written to
    pub fn bucket_name(&self) -> &str {
        &self.bucket_name
    }

    /// Absolute base directory for relative inputs and object naming
    pub fn upload_directory(&self) -> Option<&Path> {
        self.upload_directory.as_deref()
    }

    /// Prefix prepended to every object name
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Options applied to every write
    pub fn options_per_request(&self) -> &[TargetOption] {
        &self.options_per_request
    }

    /// Whether existing objects are left alone
    pub fn skip_if_exists(&self) -> bool {
        self.skip_if_exists
    }

    /// Local file read for an input path
    pub fn source_for(&self, file: &Path) -> PathBuf {
        match &self.upload_directory {
            Some(dir) if file.is_relative() => dir.join(file),
            _ => file.to_path_buf(),
        }
    }

    /// Object a local file is uploaded to
    pub fn destination_for(&self, file: &Path) -> Result<BlobInfo> {
        let source = self.source_for(file);
        let name = object_name_for(&source, self.upload_directory.as_deref(), &self.prefix)?;
        Ok(BlobInfo::of(self.bucket_name.clone(), name))
    }

    /// Write options, including the existence precondition when skipping
    pub fn effective_options(&self) -> Vec<TargetOption> {
        let mut options = self.options_per_request.clone();
        if self.skip_if_exists && !options.contains(&TargetOption::DoesNotExist) {
            options.push(TargetOption::DoesNotExist);
        }
        options
    }
}

/// Builder for [`ParallelUploadConfig`]
#[derive(Debug, Default, Clone)]
pub struct ParallelUploadConfigBuilder {
    bucket_name: Option<String>,
    upload_directory: Option<PathBuf>,
    prefix: String,
    options_per_request: Vec<TargetOption>,
    skip_if_exists: bool,
}

impl ParallelUploadConfigBuilder {
    /// Bucket to write to (required, non-empty)
    pub fn bucket_name(mut self, bucket: impl Into<String>) -> Self {
        self.bucket_name = Some(bucket.into());
        self
    }

    /// Base directory for relative inputs and object naming
    pub fn upload_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.upload_directory = Some(dir.into());
        self
    }

    /// Prefix prepended to object names
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Options applied to every write
    pub fn options_per_request(mut self, options: Vec<TargetOption>) -> Self {
        self.options_per_request = options;
        self
    }

    /// Skip files whose object already exists (default: false)
    pub fn skip_if_exists(mut self, skip: bool) -> Self {
        self.skip_if_exists = skip;
        self
    }

    /// Validate and build
    pub fn build(self) -> Result<ParallelUploadConfig> {
        let bucket_name = require_bucket(self.bucket_name)?;
        let upload_directory = self.upload_directory.as_deref().map(absolute).transpose()?;

        Ok(ParallelUploadConfig {
            bucket_name,
            upload_directory,
            prefix: self.prefix,
            options_per_request: self.options_per_request,
            skip_if_exists: self.skip_if_exists,
        })
    }
}
