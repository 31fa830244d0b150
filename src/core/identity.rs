//! Identity resolver.
//!
//! Derives the cache key of a file from the stat data the scanner already collected.
//! A file whose size or modification time changes gets a new key, which forces
//! re-resolution on the next run.

use crate::models::media::{IdentityKey, SourceFile};
use chrono::{DateTime, Utc};
use std::path::Path;

/// Derive the identity key for a path with the given size and mtime.
pub fn resolve(path: &Path, size: u64, mtime: DateTime<Utc>) -> IdentityKey {
    IdentityKey {
        path: path.to_path_buf(),
        size,
        mtime_ms: mtime.timestamp_millis(),
    }
}

/// Identity key of a scanned file.
pub fn key_for(file: &SourceFile) -> IdentityKey {
    resolve(&file.path, file.size, file.modified)
}

/// Stat `path` and derive its key. Returns `None` when the file cannot be read.
pub fn key_for_path(path: &Path) -> Option<IdentityKey> {
    let metadata = std::fs::metadata(path).ok()?;
    if !metadata.is_file() {
        return None;
    }
    let modified = metadata
        .modified()
        .map(DateTime::<Utc>::from)
        .ok()?;
    Some(resolve(path, metadata.len(), modified))
}
