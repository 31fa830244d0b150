//! Configuration model.
//!
//! Loaded from `<config_dir>/media_reorg/config.toml`; every section is optional.
//!
//! ```toml
//! [paths]
//! source_root = "/Volumes/HDD_RAID/Orphaned"
//! library_root = "/Volumes/HDD_RAID/Shared Media"
//! cache_path = "/Volumes/HDD_RAID/media_cache.csv"
//!
//! [ollama]
//! base_url = "http://localhost:11434"
//! model = "qwen2.5:7b"
//!
//! [pipeline]
//! min_confidence = 0.5
//! concurrency = 3
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory roots and cache location.
    pub paths: PathsConfig,
    /// Ollama configuration.
    pub ollama: OllamaConfig,
    /// TMDB configuration.
    pub tmdb: TmdbConfig,
    /// Pipeline tuning.
    pub pipeline: PipelineConfig,
}

/// Directory roots and cache location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Unorganized inbox.
    pub source_root: PathBuf,
    /// Organized library.
    pub library_root: PathBuf,
    /// Cache file.
    pub cache_path: PathBuf,
}

/// Ollama configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Service URL.
    pub base_url: String,
    /// Model to use.
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

/// TMDB configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TmdbConfig {
    /// Language for responses.
    pub language: String,
}

/// Pipeline tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Guesses below this confidence are treated as classification failures.
    pub min_confidence: f32,
    /// Maximum files resolved concurrently.
    pub concurrency: usize,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source_root: PathBuf::from("Orphaned"),
            library_root: PathBuf::from("Shared Media"),
            cache_path: dirs_config_path().join("media_cache.csv"),
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "qwen2.5:7b".to_string(),
            timeout_secs: 300,
        }
    }
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            concurrency: 3,
        }
    }
}

impl Config {
    /// Apply `OLLAMA_HOST`, `OLLAMA_MODEL` and `OLLAMA_TIMEOUT` overrides.
    pub fn apply_env(&mut self) {
        if let Ok(host) = std::env::var("OLLAMA_HOST") {
            self.ollama.base_url = host;
        }
        if let Ok(model) = std::env::var("OLLAMA_MODEL") {
            self.ollama.model = model;
        }
        if let Some(timeout) = std::env::var("OLLAMA_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            self.ollama.timeout_secs = timeout;
        }
    }

    /// Override paths given on the command line.
    pub fn with_overrides(
        mut self,
        source_root: Option<&Path>,
        library_root: Option<&Path>,
        cache_path: Option<&Path>,
    ) -> Self {
        if let Some(p) = source_root {
            self.paths.source_root = p.to_path_buf();
        }
        if let Some(p) = library_root {
            self.paths.library_root = p.to_path_buf();
        }
        if let Some(p) = cache_path {
            self.paths.cache_path = p.to_path_buf();
        }
        self
    }
}

/// Get the configuration directory path.
fn dirs_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("media_reorg")
}

/// Load configuration from file, falling back to defaults.
pub fn load_config() -> Config {
    let config_path = dirs_config_path().join("config.toml");
    let mut config = load_config_from(&config_path);
    config.apply_env();
    config
}

/// Load configuration from a specific file.
pub fn load_config_from(path: &Path) -> Config {
    if path.exists() {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => return config,
                Err(e) => tracing::warn!("Ignoring invalid config {:?}: {}", path, e),
            },
            Err(e) => tracing::warn!("Cannot read config {:?}: {}", path, e),
        }
    }

    Config::default()
}
