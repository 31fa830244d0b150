//! Integration tests for the CSV metadata cache.
//!
//! Tests cover:
//! - Persistence across reopen
//! - Tolerance for corrupt rows and foreign columns
//! - Purging stale entries

use media_reorg::core::cache::{CacheEntry, CsvCache, MetadataCache};
use media_reorg::models::media::{IdentityKey, MediaKind, MetadataRecord};
use media_reorg::Error;
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn key(path: &str, size: u64) -> IdentityKey {
    IdentityKey {
        path: PathBuf::from(path),
        size,
        mtime_ms: 1_700_000_000_000,
    }
}

fn key_at(path: &str, size: u64, mtime_ms: i64) -> IdentityKey {
    IdentityKey {
        path: PathBuf::from(path),
        size,
        mtime_ms,
    }
}

#[test]
fn test_missing_file_is_empty_cache() {
    let temp_dir = TempDir::new().unwrap();
    let cache = CsvCache::open(&temp_dir.path().join("none.csv")).unwrap();
    assert!(cache.is_empty());
}

#[test]
fn test_entries_survive_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested/media_cache.csv");

    {
        let mut cache = CsvCache::open(&path).unwrap();
        let movie = MetadataRecord::movie("Foo", Some(2020), "tmdb1")
            .with_collection(Some("Foo Collection".to_string()));
        assert!(cache
            .store(CacheEntry::new(key("/in/Foo.2020.mkv", 10), movie), false)
            .unwrap());
        let episode = MetadataRecord::episode("Bar, The Show", None, "tmdb2", 1, 2);
        cache
            .store(CacheEntry::new(key("/in/Bar.S01E02.mkv", 20), episode), false)
            .unwrap();
    }

    let cache = CsvCache::open(&path).unwrap();
    assert_eq!(cache.len(), 2);

    let movie = cache.lookup(&key("/in/Foo.2020.mkv", 10)).unwrap();
    assert_eq!(movie.title, "Foo");
    assert_eq!(movie.year, Some(2020));
    assert_eq!(movie.collection.as_deref(), Some("Foo Collection"));

    let episode = cache.lookup(&key("/in/Bar.S01E02.mkv", 20)).unwrap();
    assert_eq!(episode.title, "Bar, The Show");
    assert_eq!(episode.kind(), MediaKind::Episode);

    // Same path, different size is a different file
    assert!(cache.lookup(&key("/in/Foo.2020.mkv", 11)).is_none());

    let counts = cache.count_by_kind();
    assert_eq!(counts.get(&MediaKind::Movie), Some(&1));
    assert_eq!(counts.get(&MediaKind::Episode), Some(&1));
}

#[test]
fn test_refresh_wins_after_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("media_cache.csv");

    {
        let mut cache = CsvCache::open(&path).unwrap();
        let k = key("/in/Foo.mkv", 10);
        cache
            .store(CacheEntry::new(k.clone(), MetadataRecord::movie("Wrong", None, "tmdb1")), false)
            .unwrap();
        cache
            .store(CacheEntry::new(k, MetadataRecord::movie("Foo", Some(2020), "tmdb2")), true)
            .unwrap();
    }

    let cache = CsvCache::open(&path).unwrap();
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.lookup(&key("/in/Foo.mkv", 10)).unwrap().title, "Foo");
}

#[test]
fn test_bad_rows_are_dropped() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("media_cache.csv");
    fs::write(
        &path,
        "path,size,mtime_ms,kind,title,year,season,episode,episode_title,id,collection,resolved_at\n\
         /in/a.mkv,1,5,movie,Alpha,1999,,,,tmdb1,,2024-01-01T00:00:00+00:00\n\
         /in/b.mkv,not-a-number,5,movie,Beta,,,,,tmdb2,,2024-01-01T00:00:00+00:00\n\
         /in/c.mkv,3,5,cartoon,Gamma,,,,,tmdb3,,2024-01-01T00:00:00+00:00\n\
         /in/d.mkv,4,5,episode,Delta,,,,,tmdb4,,2024-01-01T00:00:00+00:00\n\
         /in/e.mkv,5,5,episode,Echo,,1,2,Pilot,tmdb5,,2024-01-01T00:00:00+00:00\n",
    )
    .unwrap();

    let mut cache = CsvCache::open(&path).unwrap();
    assert_eq!(cache.len(), 2);
    assert!(cache.lookup(&key_at("/in/a.mkv", 1, 5)).is_some());
    assert!(cache.lookup(&key_at("/in/e.mkv", 5, 5)).is_some());

    // A purge rewrites the file without the dropped rows
    let live: HashSet<IdentityKey> = cache.entries().map(|e| e.key.clone()).collect();
    assert_eq!(cache.purge_stale(&live).unwrap(), 0);
    let content = fs::read_to_string(&path).unwrap();
    assert!(!content.contains("Beta"));
    assert!(!content.contains("Gamma"));
    assert!(content.contains("Echo"));
}

#[test]
fn test_unknown_columns_are_ignored() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("media_cache.csv");
    fs::write(
        &path,
        "path,size,mtime_ms,kind,title,id,resolved_at,rating\n\
         /in/a.mkv,1,5,movie,Alpha,tmdb1,2024-01-01T00:00:00+00:00,PG\n",
    )
    .unwrap();

    let mut cache = CsvCache::open(&path).unwrap();
    let record = cache.lookup(&key_at("/in/a.mkv", 1, 5)).unwrap();
    assert_eq!(record.title, "Alpha");
    assert_eq!(record.year, None);

    // The next write brings the file back to the current layout
    cache
        .store(
            CacheEntry::new(key("/in/b.mkv", 2), MetadataRecord::movie("Beta", None, "tmdb2")),
            false,
        )
        .unwrap();
    let header = fs::read_to_string(&path)
        .unwrap()
        .lines()
        .next()
        .unwrap()
        .to_string();
    assert!(header.starts_with("path,size,mtime_ms,kind,title,year"));
    assert!(!header.contains("rating"));
    assert_eq!(CsvCache::open(&path).unwrap().len(), 2);
}

#[test]
fn test_purge_removes_only_stale_entries() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("media_cache.csv");

    let mut cache = CsvCache::open(&path).unwrap();
    for (i, name) in ["/lib/a.mkv", "/lib/b.mkv", "/lib/c.mkv"].iter().enumerate() {
        cache
            .store(
                CacheEntry::new(key(name, i as u64), MetadataRecord::movie(*name, None, "tmdb")),
                false,
            )
            .unwrap();
    }

    let live: HashSet<IdentityKey> = [key("/lib/a.mkv", 0), key("/lib/c.mkv", 2)]
        .into_iter()
        .collect();
    assert_eq!(cache.purge_stale(&live).unwrap(), 1);
    assert_eq!(cache.len(), 2);

    let reopened = CsvCache::open(&path).unwrap();
    assert_eq!(reopened.len(), 2);
    assert!(reopened.lookup(&key("/lib/b.mkv", 1)).is_none());
}

#[cfg(unix)]
#[test]
fn test_unreadable_cache_is_fatal() {
    let temp_dir = TempDir::new().unwrap();
    // A directory where the file should be cannot be read as CSV
    let path = temp_dir.path().join("media_cache.csv");
    fs::create_dir(&path).unwrap();

    let err = CsvCache::open(&path).unwrap_err();
    assert!(matches!(err, Error::CacheUnreadable { .. }));
    assert!(err.is_fatal());
}
