//! Media-related data models.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Kind of a resolved media item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Episode,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Movie => write!(f, "movie"),
            MediaKind::Episode => write!(f, "episode"),
        }
    }
}

impl std::str::FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "movie" => Ok(MediaKind::Movie),
            "episode" => Ok(MediaKind::Episode),
            other => Err(format!("unknown media kind '{}'", other)),
        }
    }
}

/// A video file found by a directory scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    /// Full path to the file.
    pub path: PathBuf,
    /// File name without path.
    pub filename: String,
    /// Lowercase extension without the dot.
    pub extension: String,
    /// File size in bytes.
    pub size: u64,
    /// Last modified time.
    pub modified: chrono::DateTime<chrono::Utc>,
    /// Parent directory.
    pub parent_dir: PathBuf,
    /// Files next to this one sharing its stem (subtitles, nfo, ...).
    pub sidecars: Vec<PathBuf>,
}

impl SourceFile {
    /// File name without its final extension.
    pub fn stem(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(self.filename.as_str())
    }
}

/// Stable fingerprint of a file, used to address cache entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IdentityKey {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    /// Modification time as milliseconds since the Unix epoch.
    pub mtime_ms: i64,
}

impl IdentityKey {
    /// Whether `other` describes the same bytes, wherever they live.
    pub fn same_content(&self, other: &IdentityKey) -> bool {
        self.size == other.size && self.mtime_ms == other.mtime_ms
    }
}

impl std::fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}@{}", self.path.display(), self.size, self.mtime_ms)
    }
}

/// Kind-specific part of a resolved record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MediaDetails {
    Movie,
    Episode {
        season: u16,
        episode: u16,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        episode_title: Option<String>,
    },
}

/// Canonical identity of a media file, as resolved from the metadata service.
///
/// For episodes `title` and `year` describe the show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// Canonical movie or show title.
    pub title: String,
    /// Release year (movie) or first-air year (show).
    pub year: Option<u16>,
    /// External identifier, e.g. `tmdb603`.
    pub id: String,
    /// Optional grouping folder.
    pub collection: Option<String>,
    /// Movie or episode specifics.
    pub details: MediaDetails,
}

impl MetadataRecord {
    /// Build a movie record.
    pub fn movie(title: impl Into<String>, year: Option<u16>, id: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            year,
            id: id.into(),
            collection: None,
            details: MediaDetails::Movie,
        }
    }

    /// Build an episode record.
    pub fn episode(
        show_title: impl Into<String>,
        year: Option<u16>,
        id: impl Into<String>,
        season: u16,
        episode: u16,
    ) -> Self {
        Self {
            title: show_title.into(),
            year,
            id: id.into(),
            collection: None,
            details: MediaDetails::Episode {
                season,
                episode,
                episode_title: None,
            },
        }
    }

    /// Set the collection folder.
    pub fn with_collection(mut self, collection: Option<String>) -> Self {
        self.collection = collection.filter(|c| !c.trim().is_empty());
        self
    }

    /// Media kind of this record.
    pub fn kind(&self) -> MediaKind {
        match self.details {
            MediaDetails::Movie => MediaKind::Movie,
            MediaDetails::Episode { .. } => MediaKind::Episode,
        }
    }
}
