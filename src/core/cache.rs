//! Persistent metadata cache.
//!
//! Maps [`IdentityKey`]s to resolved [`MetadataRecord`]s so unchanged files never
//! reach the classifier or TMDB twice. The default store is a CSV file with one
//! row per entry:
//!
//! ```text
//! path,size,mtime_ms,kind,title,year,season,episode,episode_title,id,collection,resolved_at
//! ```
//!
//! Columns are matched by header name, so unknown columns are ignored and
//! optional ones may be missing. Rows that fail to parse are dropped with a
//! warning. Every store is appended and flushed before returning; when the same
//! key appears twice the later row wins.

use crate::models::media::{IdentityKey, MediaDetails, MediaKind, MetadataRecord};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

/// A cached resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: IdentityKey,
    pub record: MetadataRecord,
    pub resolved_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Create an entry stamped with the current time.
    pub fn new(key: IdentityKey, record: MetadataRecord) -> Self {
        Self {
            key,
            record,
            resolved_at: Utc::now(),
        }
    }
}

/// Store of resolved identities.
///
/// Lookups take `&self` and may run concurrently; `store` and `purge_stale`
/// take `&mut self`, so a shared cache behind a lock has a single writer.
pub trait MetadataCache: Send + Sync {
    /// Record cached for `key`, if any.
    fn lookup(&self, key: &IdentityKey) -> Option<MetadataRecord>;

    /// Insert an entry. An existing entry is kept unless `refresh` is set.
    /// Returns whether the entry was written.
    fn store(&mut self, entry: CacheEntry, refresh: bool) -> Result<bool>;

    /// Remove every entry whose key is not in `live`. Returns the number removed.
    fn purge_stale(&mut self, live: &HashSet<IdentityKey>) -> Result<usize>;

    /// Number of entries.
    fn len(&self) -> usize;

    /// Whether the cache holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One CSV row.
#[derive(Debug, Serialize, Deserialize)]
struct CacheRow {
    path: String,
    size: u64,
    mtime_ms: i64,
    kind: String,
    title: String,
    #[serde(default)]
    year: Option<u16>,
    #[serde(default)]
    season: Option<u16>,
    #[serde(default)]
    episode: Option<u16>,
    #[serde(default)]
    episode_title: Option<String>,
    id: String,
    #[serde(default)]
    collection: Option<String>,
    resolved_at: String,
}

const HEADERS: &[&str] = &[
    "path",
    "size",
    "mtime_ms",
    "kind",
    "title",
    "year",
    "season",
    "episode",
    "episode_title",
    "id",
    "collection",
    "resolved_at",
];

impl From<&CacheEntry> for CacheRow {
    fn from(entry: &CacheEntry) -> Self {
        let (season, episode, episode_title) = match &entry.record.details {
            MediaDetails::Movie => (None, None, None),
            MediaDetails::Episode {
                season,
                episode,
                episode_title,
            } => (Some(*season), Some(*episode), episode_title.clone()),
        };

        Self {
            path: entry.key.path.to_string_lossy().to_string(),
            size: entry.key.size,
            mtime_ms: entry.key.mtime_ms,
            kind: entry.record.kind().to_string(),
            title: entry.record.title.clone(),
            year: entry.record.year,
            season,
            episode,
            episode_title,
            id: entry.record.id.clone(),
            collection: entry.record.collection.clone(),
            resolved_at: entry.resolved_at.to_rfc3339(),
        }
    }
}

impl CacheRow {
    fn into_entry(self) -> std::result::Result<CacheEntry, String> {
        if self.path.trim().is_empty() {
            return Err("empty path".to_string());
        }
        if self.title.trim().is_empty() {
            return Err("empty title".to_string());
        }

        let details = match self.kind.parse::<MediaKind>()? {
            MediaKind::Movie => MediaDetails::Movie,
            MediaKind::Episode => match (self.season, self.episode) {
                (Some(season), Some(episode)) => MediaDetails::Episode {
                    season,
                    episode,
                    episode_title: self.episode_title,
                },
                _ => return Err("episode row without season/episode".to_string()),
            },
        };

        let resolved_at = DateTime::parse_from_rfc3339(&self.resolved_at)
            .map_err(|e| format!("bad resolved_at '{}': {}", self.resolved_at, e))?
            .with_timezone(&Utc);

        Ok(CacheEntry {
            key: IdentityKey {
                path: PathBuf::from(self.path),
                size: self.size,
                mtime_ms: self.mtime_ms,
            },
            record: MetadataRecord {
                title: self.title,
                year: self.year,
                id: self.id,
                collection: self.collection.filter(|c| !c.trim().is_empty()),
                details,
            },
            resolved_at,
        })
    }
}

/// CSV-backed cache.
#[derive(Debug)]
pub struct CsvCache {
    path: PathBuf,
    entries: HashMap<IdentityKey, CacheEntry>,
    /// File content differs from `entries` (duplicates, dropped rows, foreign header).
    dirty: bool,
}

impl CsvCache {
    /// Load the cache at `path`. A missing file yields an empty cache.
    ///
    /// Fails only when the file exists but cannot be read.
    pub fn open(path: &Path) -> Result<Self> {
        let mut cache = Self {
            path: path.to_path_buf(),
            entries: HashMap::new(),
            dirty: false,
        };

        if !path.exists() {
            tracing::info!("No cache file at {:?}, starting empty", path);
            return Ok(cache);
        }

        let unreadable = |reason: String| Error::CacheUnreadable {
            path: path.display().to_string(),
            reason,
        };

        let file = fs::File::open(path).map_err(|e| unreadable(e.to_string()))?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);

        let headers = match reader.byte_headers() {
            Ok(h) => h.clone(),
            Err(e) if e.is_io_error() => return Err(unreadable(e.to_string())),
            Err(e) => {
                tracing::warn!("Cache header unreadable, discarding {:?}: {}", path, e);
                cache.dirty = true;
                return Ok(cache);
            }
        };
        if headers.iter().ne(HEADERS.iter().map(|h| h.as_bytes())) {
            cache.dirty = true;
        }

        let mut rows = 0u64;
        let mut dropped = 0usize;
        for result in reader.byte_records() {
            rows += 1;
            let record = match result {
                Ok(r) => r,
                Err(e) if e.is_io_error() => return Err(unreadable(e.to_string())),
                Err(e) => {
                    let err = Error::CacheCorruptEntry {
                        row: rows,
                        reason: e.to_string(),
                    };
                    tracing::warn!("Dropping cache row: {}", err);
                    dropped += 1;
                    continue;
                }
            };

            let entry = record
                .deserialize::<CacheRow>(Some(&headers))
                .map_err(|e| e.to_string())
                .and_then(CacheRow::into_entry);

            match entry {
                Ok(entry) => {
                    if cache.entries.insert(entry.key.clone(), entry).is_some() {
                        cache.dirty = true;
                    }
                }
                Err(reason) => {
                    let err = Error::CacheCorruptEntry { row: rows, reason };
                    tracing::warn!("Dropping cache row: {}", err);
                    dropped += 1;
                }
            }
        }

        if dropped > 0 {
            cache.dirty = true;
        }

        tracing::info!(
            "Loaded {} cache entries from {:?} ({} rows dropped)",
            cache.entries.len(),
            path,
            dropped
        );

        Ok(cache)
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Iterate over all entries.
    pub fn entries(&self) -> impl Iterator<Item = &CacheEntry> {
        self.entries.values()
    }

    /// Entry count per media kind.
    pub fn count_by_kind(&self) -> HashMap<MediaKind, usize> {
        let mut counts = HashMap::new();
        for entry in self.entries.values() {
            *counts.entry(entry.record.kind()).or_insert(0) += 1;
        }
        counts
    }

    /// Append one row and flush it.
    fn append(&mut self, entry: &CacheEntry) -> Result<()> {
        if self.dirty {
            // Bring the file in line with our schema before appending to it.
            self.entries.insert(entry.key.clone(), entry.clone());
            return self.rewrite();
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let write_headers = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(write_headers)
            .from_writer(file);
        writer.serialize(CacheRow::from(entry))?;
        writer.flush()?;
        Ok(())
    }

    /// Rewrite the whole file atomically from memory.
    fn rewrite(&mut self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = self.path.with_extension("csv.tmp");
        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_path(&tmp_path)?;
            writer.write_record(HEADERS)?;

            let mut entries: Vec<&CacheEntry> = self.entries.values().collect();
            entries.sort_by(|a, b| a.key.cmp(&b.key));
            for entry in entries {
                writer.serialize(CacheRow::from(entry))?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        self.dirty = false;
        tracing::debug!(
            "Rewrote cache {:?} with {} entries",
            self.path,
            self.entries.len()
        );
        Ok(())
    }
}

impl MetadataCache for CsvCache {
    fn lookup(&self, key: &IdentityKey) -> Option<MetadataRecord> {
        self.entries.get(key).map(|e| e.record.clone())
    }

    fn store(&mut self, entry: CacheEntry, refresh: bool) -> Result<bool> {
        if !refresh && self.entries.contains_key(&entry.key) {
            tracing::debug!("Cache entry already present for {}", entry.key);
            return Ok(false);
        }

        self.append(&entry)?;
        tracing::debug!("Cached {} -> {}", entry.key, entry.record.title);
        self.entries.insert(entry.key.clone(), entry);
        Ok(true)
    }

    fn purge_stale(&mut self, live: &HashSet<IdentityKey>) -> Result<usize> {
        let before = self.entries.len();
        self.entries.retain(|key, _| {
            let keep = live.contains(key);
            if !keep {
                tracing::info!("Removing {} from cache as it no longer exists", key.path.display());
            }
            keep
        });
        let removed = before - self.entries.len();

        if removed > 0 || self.dirty {
            self.rewrite()?;
        }
        Ok(removed)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
