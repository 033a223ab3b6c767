//! Filesystem-backed object store
//!
//! Each bucket is a directory under the store root and each object a file
//! named by its object name. Writes are staged under a hidden directory and
//! renamed into place on close, so readers never observe a half-written
//! object. Generations are derived from modification times.

use crate::error::{IoResultExt, Result, XferError};
use crate::storage::{BlobId, BlobInfo, ObjectStorage, ObjectWriter, SourceOption, TargetOption};
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::UNIX_EPOCH;

const STAGING_DIR: &str = ".bulkxfer-staging";

static NEXT_STAGING_ID: AtomicU64 = AtomicU64::new(0);

/// Object store backed by a local directory tree
#[derive(Debug, Clone)]
pub struct LocalObjectStorage {
    root: PathBuf,
}

impl LocalObjectStorage {
    /// Open (creating if needed) a store rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).with_path(&root)?;
        Ok(Self { root })
    }

    /// Store root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a bucket directory
    pub fn create_bucket(&self, bucket: &str) -> Result<()> {
        let dir = self.bucket_dir(bucket)?;
        fs::create_dir_all(&dir).with_path(dir)
    }

    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf> {
        if bucket.is_empty() || bucket.contains('/') || bucket == "." || bucket == ".." || bucket == STAGING_DIR {
            return Err(XferError::InvalidPath(format!("invalid bucket name '{}'", bucket)));
        }
        Ok(self.root.join(bucket))
    }

    fn object_path(&self, bucket: &str, name: &str) -> Result<PathBuf> {
        let relative = Path::new(name);
        let safe = !name.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(XferError::InvalidPath(format!("invalid object name '{}'", name)));
        }
        Ok(self.bucket_dir(bucket)?.join(relative))
    }

    /// Metadata of the live object, or `None` when it does not exist
    pub fn stat(&self, bucket: &str, name: &str) -> Result<Option<BlobInfo>> {
        let path = self.object_path(bucket, name)?;
        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => Ok(Some(blob_info(bucket, name, &meta))),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(XferError::io(path, e)),
        }
    }
}

fn generation_of(meta: &fs::Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_micros() as i64)
        .unwrap_or(0)
}

fn blob_info(bucket: &str, name: &str, meta: &fs::Metadata) -> BlobInfo {
    BlobInfo {
        id: BlobId::of(bucket, name).with_generation(generation_of(meta)),
        size: Some(meta.len()),
        content_type: None,
        metageneration: Some(1),
    }
}

fn check_source_options(live: &BlobInfo, options: &[SourceOption]) -> Result<()> {
    let generation = live.id.generation.unwrap_or(0);
    let metageneration = live.metageneration.unwrap_or(1);
    for option in options {
        let failed = match option {
            SourceOption::GenerationMatch(g) => generation != *g,
            SourceOption::GenerationNotMatch(g) => generation == *g,
            SourceOption::MetagenerationMatch(m) => metageneration != *m,
            SourceOption::MetagenerationNotMatch(m) => metageneration == *m,
            SourceOption::UserProject(_) => false,
        };
        if failed {
            return Err(XferError::precondition(
                live.bucket(),
                live.name(),
                format!("{:?} not satisfied", option),
            ));
        }
    }
    Ok(())
}

fn check_target_options(
    bucket: &str,
    name: &str,
    live: Option<&BlobInfo>,
    options: &[TargetOption],
) -> Result<()> {
    for option in options {
        let failed = match (option, live) {
            (TargetOption::DoesNotExist, live) => live.is_some(),
            // Generation 0 means "no live object"
            (TargetOption::GenerationMatch(g), None) => *g != 0,
            (TargetOption::GenerationMatch(g), Some(l)) => l.id.generation != Some(*g),
            (TargetOption::MetagenerationMatch(_), None) => true,
            (TargetOption::MetagenerationMatch(m), Some(l)) => l.metageneration != Some(*m),
            (TargetOption::UserProject(_), _) | (TargetOption::ContentType(_), _) => false,
        };
        if failed {
            return Err(match option {
                TargetOption::DoesNotExist => XferError::already_exists(bucket, name),
                _ => XferError::precondition(bucket, name, format!("{:?} not satisfied", option)),
            });
        }
    }
    Ok(())
}

impl ObjectStorage for LocalObjectStorage {
    fn reader(&self, id: &BlobId, options: &[SourceOption]) -> Result<Box<dyn Read + Send>> {
        let live = self.stat(&id.bucket, &id.name)?.ok_or_else(|| XferError::NotFound {
            bucket: id.bucket.clone(),
            name: id.name.clone(),
        })?;

        if let Some(pinned) = id.generation {
            if live.id.generation != Some(pinned) {
                return Err(XferError::NotFound {
                    bucket: id.bucket.clone(),
                    name: format!("{}#{}", id.name, pinned),
                });
            }
        }
        check_source_options(&live, options)?;

        let path = self.object_path(&id.bucket, &id.name)?;
        let file = File::open(&path).with_path(&path)?;
        Ok(Box::new(file))
    }

    fn writer(&self, info: &BlobInfo, options: &[TargetOption]) -> Result<Box<dyn ObjectWriter>> {
        let target = self.object_path(info.bucket(), info.name())?;
        let live = self.stat(info.bucket(), info.name())?;
        check_target_options(info.bucket(), info.name(), live.as_ref(), options)?;

        let staging_dir = self.root.join(STAGING_DIR);
        fs::create_dir_all(&staging_dir).with_path(&staging_dir)?;
        let staging = staging_dir.join(format!(
            "{}-{}",
            std::process::id(),
            NEXT_STAGING_ID.fetch_add(1, Ordering::Relaxed)
        ));
        let file = File::create(&staging).with_path(&staging)?;

        let content_type = options.iter().find_map(|o| match o {
            TargetOption::ContentType(ct) => Some(ct.clone()),
            _ => None,
        });

        Ok(Box::new(LocalObjectWriter {
            storage: self.clone(),
            info: BlobInfo {
                content_type: content_type.or_else(|| info.content_type.clone()),
                ..info.clone()
            },
            options: options.to_vec(),
            staging,
            target,
            file: Some(BufWriter::new(file)),
        }))
    }

    fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<BlobInfo>> {
        let dir = self.bucket_dir(bucket)?;
        if !dir.is_dir() {
            return Err(XferError::NotFound {
                bucket: bucket.to_string(),
                name: String::new(),
            });
        }

        let mut objects = Vec::new();
        for entry in walkdir::WalkDir::new(&dir).sort_by_file_name() {
            let entry = entry.map_err(|e| XferError::storage(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&dir) else {
                continue;
            };
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if !name.starts_with(prefix) {
                continue;
            }
            let meta = entry.metadata().map_err(|e| XferError::storage(e.to_string()))?;
            objects.push(blob_info(bucket, &name, &meta));
        }
        Ok(objects)
    }
}

struct LocalObjectWriter {
    storage: LocalObjectStorage,
    info: BlobInfo,
    options: Vec<TargetOption>,
    staging: PathBuf,
    target: PathBuf,
    file: Option<BufWriter<File>>,
}

impl Write for LocalObjectWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.file.as_mut() {
            Some(file) => file.write(buf),
            None => Err(io::Error::new(io::ErrorKind::BrokenPipe, "writer already closed")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl ObjectWriter for LocalObjectWriter {
    fn close(mut self: Box<Self>) -> Result<BlobInfo> {
        if let Some(file) = self.file.take() {
            let file = file
                .into_inner()
                .map_err(|e| XferError::io(&self.staging, e.into_error()))?;
            file.sync_all().with_path(&self.staging)?;
        }

        // Re-check preconditions at commit time: another writer may have won.
        let live = self.storage.stat(self.info.bucket(), self.info.name())?;
        check_target_options(self.info.bucket(), self.info.name(), live.as_ref(), &self.options)?;

        if let Some(parent) = self.target.parent() {
            fs::create_dir_all(parent).with_path(parent)?;
        }
        fs::rename(&self.staging, &self.target).with_path(&self.target)?;

        let meta = fs::metadata(&self.target).with_path(&self.target)?;
        let mut committed = blob_info(self.info.bucket(), self.info.name(), &meta);
        committed.content_type = self.info.content_type.clone();
        Ok(committed)
    }
}

impl Drop for LocalObjectWriter {
    fn drop(&mut self) {
        // Uncommitted or failed uploads leave nothing behind
        let _ = fs::remove_file(&self.staging);
    }
}
