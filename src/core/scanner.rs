//! Directory scanner module.
//!
//! Scans directories recursively for video files and attaches the sidecar files
//! (subtitles, nfo, artwork) that share each video's stem.

use crate::core::identity;
use crate::models::media::{IdentityKey, SourceFile};
use crate::utils::fs as fs_utils;
use crate::Result;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Supported video file extensions.
const VIDEO_EXTENSIONS: &[&str] = &[
    // Common formats
    "mkv", "mp4", "avi", "mov", "wmv", // Additional formats
    "m4v", "ts", "m2ts", "flv", "webm", // Less common but supported
    "mpg", "mpeg", "vob", "ogv", "divx", "3gp", "mts", "rmvb", "asf",
];

/// Result of scanning a directory.
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Primary video files, sorted by path.
    pub files: Vec<SourceFile>,
    /// Videos ignored because they are samples or extras.
    pub ignored: usize,
    /// Total files scanned.
    pub total_files_scanned: usize,
    /// Total directories scanned.
    pub total_dirs_scanned: usize,
}

/// Check if a file extension is a video format.
pub fn is_video_extension(ext: &str) -> bool {
    let ext_lower = ext.to_lowercase();
    VIDEO_EXTENSIONS.contains(&ext_lower.as_str())
}

fn is_video_path(path: &Path) -> bool {
    path.extension()
        .map(|e| is_video_extension(&e.to_string_lossy()))
        .unwrap_or(false)
}

/// Check if a file is inside an "Extras" or "Sample" directory.
///
/// Matched names (case-insensitive): extras, featurettes, behind the scenes,
/// deleted scenes, making of, bonus, special features, sample(s), and names
/// ending in `.extras` / `-extras` / `_extras`.
fn is_in_extras_directory(path: &Path) -> bool {
    const EXTRAS_NAMES: &[&str] = &[
        "extras",
        "extra",
        "featurettes",
        "featurette",
        "behind the scenes",
        "behindthescenes",
        "deleted scenes",
        "deletedscenes",
        "making of",
        "makingof",
        "bonus",
        "bonuses",
        "special features",
        "specialfeatures",
        "sample",
        "samples",
    ];

    let Some(parent) = path.parent() else {
        return false;
    };

    parent.components().any(|component| {
        let std::path::Component::Normal(name) = component else {
            return false;
        };
        let name = name.to_string_lossy().to_lowercase();
        EXTRAS_NAMES.contains(&name.as_str())
            || name.ends_with(".extras")
            || name.ends_with("-extras")
            || name.ends_with("_extras")
    })
}

/// Check if a filename indicates a sample file.
fn is_sample_filename(filename: &str) -> bool {
    let lower = filename.to_lowercase();
    lower.contains("sample") && !lower.contains("sampler")
}

/// AppleDouble resource forks left behind by macOS.
fn is_resource_fork(filename: &str) -> bool {
    filename.starts_with("._")
}

/// Create a SourceFile from a path.
fn create_source_file(path: &Path) -> Result<SourceFile> {
    let metadata = std::fs::metadata(path)?;
    let modified = metadata
        .modified()
        .map(chrono::DateTime::<chrono::Utc>::from)?;

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let parent_dir = path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));

    Ok(SourceFile {
        path: path.to_path_buf(),
        filename,
        extension,
        size: metadata.len(),
        modified,
        parent_dir,
        sidecars: Vec::new(),
    })
}

/// Assign the non-video files of one directory to the videos they belong to.
///
/// A sidecar starts with a video's stem followed by a dot, e.g. `Foo.2020.srt`
/// and `Foo.2020.en.forced.srt` for `Foo.2020.mkv`. When several stems match,
/// the longest wins: `alien.1979.resurrection.en.srt` belongs to
/// `alien.1979.resurrection.mkv`, not to `alien.1979.mkv`.
fn assign_sidecars(siblings: &[PathBuf]) -> HashMap<PathBuf, Vec<PathBuf>> {
    let mut videos: Vec<(&PathBuf, String)> = siblings
        .iter()
        .filter(|p| is_video_path(p))
        .filter_map(|p| {
            p.file_stem()
                .map(|stem| (p, format!("{}.", stem.to_string_lossy())))
        })
        .collect();
    videos.sort();

    let mut assigned: HashMap<PathBuf, Vec<PathBuf>> = HashMap::new();
    for sibling in siblings.iter().filter(|p| !is_video_path(p)) {
        let name = sibling
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if is_resource_fork(&name) {
            continue;
        }

        let owner = videos
            .iter()
            .filter(|(_, prefix)| name.starts_with(prefix.as_str()))
            .max_by_key(|(_, prefix)| prefix.len());
        if let Some((video, _)) = owner {
            assigned
                .entry((*video).clone())
                .or_default()
                .push(sibling.clone());
        }
    }

    for sidecars in assigned.values_mut() {
        sidecars.sort();
    }
    assigned
}

/// Scan a directory for video files.
///
/// Returns every primary video below `path` (samples, extras and `._` files
/// excluded) with its sidecars attached. Unreadable entries are logged and
/// skipped.
pub fn scan_directory(path: &Path) -> Result<ScanResult> {
    fs_utils::ensure_directory(path)?;

    let mut result = ScanResult::default();
    let mut files_by_dir: HashMap<PathBuf, Vec<PathBuf>> = HashMap::new();
    let mut videos: Vec<PathBuf> = Vec::new();

    for entry in WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::warn!("Skipping unreadable entry: {}", err);
                None
            }
        })
    {
        let entry_path = entry.path();

        if entry.file_type().is_dir() {
            result.total_dirs_scanned += 1;
            continue;
        }
        if !entry.file_type().is_file() {
            continue;
        }

        result.total_files_scanned += 1;
        let filename = entry.file_name().to_string_lossy();
        if is_resource_fork(&filename) {
            continue;
        }

        if let Some(parent) = entry_path.parent() {
            files_by_dir
                .entry(parent.to_path_buf())
                .or_default()
                .push(entry_path.to_path_buf());
        }

        if !is_video_path(entry_path) {
            continue;
        }

        if is_in_extras_directory(entry_path) || is_sample_filename(&filename) {
            tracing::debug!("Ignoring sample/extra: {}", entry_path.display());
            result.ignored += 1;
            continue;
        }

        videos.push(entry_path.to_path_buf());
    }

    // Samples and extras stay in the candidate list so they keep their own sidecars
    let mut sidecars: HashMap<PathBuf, Vec<PathBuf>> = files_by_dir
        .values()
        .flat_map(|siblings| assign_sidecars(siblings))
        .collect();

    for video in videos {
        match create_source_file(&video) {
            Ok(mut file) => {
                file.sidecars = sidecars.remove(&file.path).unwrap_or_default();
                result.files.push(file);
            }
            Err(e) => {
                tracing::warn!("Failed to read video file {:?}: {}", video, e);
            }
        }
    }

    // Sort results for consistent output
    result.files.sort_by(|a, b| a.path.cmp(&b.path));

    tracing::info!(
        "Scanned {} files in {} directories under {:?}: {} videos, {} ignored",
        result.total_files_scanned,
        result.total_dirs_scanned,
        path,
        result.files.len(),
        result.ignored
    );

    Ok(result)
}

/// Identity keys of every primary video under the given roots.
///
/// Roots that do not exist yet contribute nothing.
pub fn collect_keys(roots: &[&Path]) -> Result<HashSet<IdentityKey>> {
    let mut keys = HashSet::new();
    for root in roots {
        if !root.exists() {
            continue;
        }
        let scan = scan_directory(root)?;
        keys.extend(scan.files.iter().map(identity::key_for));
    }
    Ok(keys)
}
