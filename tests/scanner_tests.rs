//! Integration tests for the scanner module.
//!
//! Tests cover:
//! - Directory scanning with video files and sidecars
//! - Sample, extras and resource-fork exclusion
//! - Error handling for non-existent paths

use media_reorg::core::scanner::{collect_keys, scan_directory};
use media_reorg::Error;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn touch(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

#[test]
fn test_scan_empty_directory() {
    let temp_dir = TempDir::new().unwrap();
    let result = scan_directory(temp_dir.path()).unwrap();

    assert_eq!(result.files.len(), 0);
    assert_eq!(result.ignored, 0);
}

#[test]
fn test_scan_with_video_files() {
    let temp_dir = TempDir::new().unwrap();
    touch(&temp_dir.path().join("movie.mkv"), "fake video content");
    touch(&temp_dir.path().join("notes.txt"), "not a video");

    let result = scan_directory(temp_dir.path()).unwrap();

    assert_eq!(result.files.len(), 1);
    let file = &result.files[0];
    assert_eq!(file.filename, "movie.mkv");
    assert_eq!(file.extension, "mkv");
    assert_eq!(file.size, "fake video content".len() as u64);
    assert_eq!(file.parent_dir, temp_dir.path());
    assert_eq!(result.total_files_scanned, 2);
}

#[test]
fn test_scan_is_recursive_and_sorted() {
    let temp_dir = TempDir::new().unwrap();
    touch(&temp_dir.path().join("b/Show.S01E02.mkv"), "2");
    touch(&temp_dir.path().join("a/Movie.2001.MP4"), "1");
    touch(&temp_dir.path().join("c/deep/er/Clip.avi"), "3");

    let result = scan_directory(temp_dir.path()).unwrap();
    let names: Vec<&str> = result.files.iter().map(|f| f.filename.as_str()).collect();

    assert_eq!(names, vec!["Movie.2001.MP4", "Show.S01E02.mkv", "Clip.avi"]);
    assert_eq!(result.files[0].extension, "mp4");
}

#[test]
fn test_scan_attaches_sidecars() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    touch(&dir.join("Foo.2020.mkv"), "video");
    touch(&dir.join("Foo.2020.srt"), "subs");
    touch(&dir.join("Foo.2020.en.forced.srt"), "subs");
    touch(&dir.join("Foo.2020.nfo"), "<movie/>");
    touch(&dir.join("Foo.2021.srt"), "other film");
    touch(&dir.join("other/Foo.2020.srt"), "different folder");

    let result = scan_directory(dir).unwrap();
    assert_eq!(result.files.len(), 1);
    assert_eq!(
        result.files[0].sidecars,
        vec![
            dir.join("Foo.2020.en.forced.srt"),
            dir.join("Foo.2020.nfo"),
            dir.join("Foo.2020.srt"),
        ]
    );
}

#[test]
fn test_scan_skips_samples_and_extras() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    touch(&dir.join("Movie/Movie.mkv"), "main");
    touch(&dir.join("Movie/Sample/sample.mkv"), "sample");
    touch(&dir.join("Movie/movie-sample.mkv"), "sample");
    touch(&dir.join("Movie/Featurettes/Making It.mkv"), "extra");

    let result = scan_directory(dir).unwrap();

    assert_eq!(result.files.len(), 1);
    assert_eq!(result.files[0].filename, "Movie.mkv");
    assert_eq!(result.ignored, 3);
}

#[test]
fn test_scan_skips_resource_forks() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    touch(&dir.join("Foo.2020.mkv"), "video");
    touch(&dir.join("._Foo.2020.mkv"), "fork");
    touch(&dir.join("._Foo.2020.srt"), "fork");

    let result = scan_directory(dir).unwrap();

    assert_eq!(result.files.len(), 1);
    assert_eq!(result.files[0].filename, "Foo.2020.mkv");
    assert!(result.files[0].sidecars.is_empty());
}

#[test]
fn test_scan_nonexistent_path() {
    let err = scan_directory(Path::new("/nonexistent/path/12345")).unwrap_err();
    assert!(matches!(err, Error::PathNotFound(_)));
    assert!(err.is_fatal());
}

#[test]
fn test_scan_file_instead_of_directory() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("movie.mkv");
    touch(&file, "video");

    let err = scan_directory(&file).unwrap_err();
    assert!(matches!(err, Error::NotADirectory(_)));
}

#[test]
fn test_collect_keys_skips_missing_roots() {
    let temp_dir = TempDir::new().unwrap();
    let library = temp_dir.path().join("library");
    touch(&library.join("Movies/A (2000)/A (2000).mkv"), "a");
    touch(&library.join("Movies/A (2000)/A (2000).srt"), "subs");

    let missing = temp_dir.path().join("not-created-yet");
    let keys = collect_keys(&[library.as_path(), missing.as_path()]).unwrap();

    assert_eq!(keys.len(), 1);
    let key = keys.iter().next().unwrap();
    assert_eq!(key.path, library.join("Movies/A (2000)/A (2000).mkv"));
    assert_eq!(key.size, 1);
}

#[test]
fn test_sidecar_goes_to_video_with_longest_stem() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    touch(&dir.join("alien.1979.mkv"), "alien");
    touch(&dir.join("alien.1979.resurrection.mkv"), "resurrection");
    touch(&dir.join("alien.1979.resurrection.en.srt"), "subs");

    let result = scan_directory(dir).unwrap();
    assert_eq!(result.files.len(), 2);

    let alien = &result.files[0];
    assert_eq!(alien.filename, "alien.1979.mkv");
    assert!(alien.sidecars.is_empty());

    let resurrection = &result.files[1];
    assert_eq!(resurrection.filename, "alien.1979.resurrection.mkv");
    assert_eq!(
        resurrection.sidecars,
        vec![dir.join("alien.1979.resurrection.en.srt")]
    );
}

#[test]
fn test_sample_keeps_its_own_sidecar() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    touch(&dir.join("Foo.2020.mkv"), "main");
    touch(&dir.join("Foo.2020.sample.mkv"), "sample");
    touch(&dir.join("Foo.2020.sample.srt"), "sample subs");

    let result = scan_directory(dir).unwrap();

    assert_eq!(result.files.len(), 1);
    assert!(result.files[0].sidecars.is_empty());
}
