//! Mapping between object names and local paths
//!
//! Object names use `/` separators. Every mapping here yields a path that
//! stays below its base directory; names that cannot (absolute, `..`,
//! empty) are rejected as [`XferError::InvalidPath`].

use crate::config::PrefixMismatch;
use crate::error::{Result, XferError};
use std::path::{Component, Path, PathBuf};

/// Relative local path for an object name after removing `prefix`
///
/// Only an exact leading match is removed. Empty segments (from doubled or
/// leading slashes) are dropped.
pub fn strip_object_prefix(name: &str, prefix: &str, policy: PrefixMismatch) -> Result<PathBuf> {
    let stripped = match name.strip_prefix(prefix) {
        Some(rest) => rest,
        None => match policy {
            PrefixMismatch::Keep => name,
            PrefixMismatch::Fail => {
                return Err(XferError::InvalidPath(format!(
                    "object name '{}' does not start with prefix '{}'",
                    name, prefix
                )))
            }
        },
    };

    let mut relative = PathBuf::new();
    for segment in stripped.split('/').filter(|s| !s.is_empty()) {
        if segment == "." || segment == ".." || segment.contains('\\') {
            return Err(XferError::InvalidPath(format!(
                "object name '{}' escapes the download directory",
                name
            )));
        }
        relative.push(segment);
    }

    if relative.as_os_str().is_empty() {
        return Err(XferError::InvalidPath(format!(
            "object name '{}' maps to an empty path",
            name
        )));
    }
    Ok(relative)
}

/// Object name for a local file: `prefix` + path relative to `base`
///
/// Files outside `base` (or with no base) use their own path with any root
/// removed.
pub fn object_name_for(source: &Path, base: Option<&Path>, prefix: &str) -> Result<String> {
    let relative = base
        .and_then(|b| source.strip_prefix(b).ok())
        .unwrap_or(source);

    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                let part = part.to_str().ok_or_else(|| {
                    XferError::InvalidPath(format!("non UTF-8 path: {}", source.display()))
                })?;
                segments.push(part);
            }
            Component::ParentDir => {
                return Err(XferError::InvalidPath(format!(
                    "path '{}' contains '..'",
                    source.display()
                )))
            }
            Component::RootDir | Component::Prefix(_) | Component::CurDir => {}
        }
    }

    if segments.is_empty() {
        return Err(XferError::InvalidPath(format!(
            "path '{}' has no file name",
            source.display()
        )));
    }
    Ok(format!("{}{}", prefix, segments.join("/")))
}
