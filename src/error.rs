//! Error types for the media reorganizer.

use std::fmt;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the media reorganizer.
#[derive(Error, Debug)]
pub enum Error {
    // Startup errors
    #[error("TMDB API key not configured. Set TMDB_API_KEY environment variable")]
    TmdbApiKeyMissing,

    #[error("Cache store {path} is unreadable: {reason}")]
    CacheUnreadable { path: String, reason: String },

    // File system errors
    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    // Per-file pipeline errors
    #[error("Classification failed: {0}")]
    ClassificationFailed(String),

    #[error("No metadata match: {0}")]
    MetadataNotFound(String),

    #[error("Metadata service error: {0}")]
    MetadataServiceError(String),

    #[error("Destination already occupied: {0}")]
    PlanConflict(String),

    #[error("Move failed for {path}: {source}")]
    MoveIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt cache entry at row {row}: {reason}")]
    CacheCorruptEntry { row: u64, reason: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // HTTP errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // CSV errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Pipeline stage a per-file error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Setup,
    Scan,
    Classify,
    Resolve,
    Plan,
    Move,
    Cache,
    Other,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Setup => write!(f, "setup"),
            Stage::Scan => write!(f, "scan"),
            Stage::Classify => write!(f, "classify"),
            Stage::Resolve => write!(f, "resolve"),
            Stage::Plan => write!(f, "plan"),
            Stage::Move => write!(f, "move"),
            Stage::Cache => write!(f, "cache"),
            Stage::Other => write!(f, "other"),
        }
    }
}

impl Error {
    /// Create a generic error from a string.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }

    /// Wrap an IO error raised while moving `path`.
    pub fn move_io(path: &std::path::Path, source: std::io::Error) -> Self {
        Error::MoveIo {
            path: path.display().to_string(),
            source,
        }
    }

    /// The pipeline stage this error is reported under.
    pub fn stage(&self) -> Stage {
        match self {
            Error::TmdbApiKeyMissing => Stage::Setup,
            Error::PathNotFound(_) | Error::NotADirectory(_) => Stage::Scan,
            Error::ClassificationFailed(_) => Stage::Classify,
            // Raw HTTP and JSON errors only escape from the TMDB client
            Error::MetadataNotFound(_)
            | Error::MetadataServiceError(_)
            | Error::Http(_)
            | Error::Json(_) => Stage::Resolve,
            Error::PlanConflict(_) => Stage::Plan,
            Error::MoveIo { .. } | Error::Io(_) => Stage::Move,
            Error::CacheCorruptEntry { .. } | Error::CacheUnreadable { .. } | Error::Csv(_) => {
                Stage::Cache
            }
            Error::Other(_) => Stage::Other,
        }
    }

    /// Whether this error must abort the run before any file is processed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::TmdbApiKeyMissing
                | Error::CacheUnreadable { .. }
                | Error::PathNotFound(_)
                | Error::NotADirectory(_)
        )
    }
}
