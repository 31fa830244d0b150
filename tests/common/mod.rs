//! Shared fixtures: deterministic stand-ins for the classifier, TMDB and the
//! collection grouper.

#![allow(dead_code)]

use async_trait::async_trait;
use media_reorg::core::cache::CsvCache;
use media_reorg::core::classifier::{ClassificationGuess, Classifier};
use media_reorg::core::grouper::{Grouper, Grouping};
use media_reorg::core::pipeline::{Pipeline, PipelineOptions};
use media_reorg::core::resolver::{MetadataCandidate, MetadataQuery, MetadataService};
use media_reorg::models::media::MediaKind;
use media_reorg::{Error, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Classifier reading the conventional scene-name patterns:
/// `Title.Year.ext` or `Title (Year).ext` for movies, `Show.SxxEyy.ext` for
/// episodes.
#[derive(Default)]
pub struct FakeClassifier {
    pub calls: AtomicUsize,
}

impl FakeClassifier {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn words(s: &str) -> String {
    s.replace(['.', '_'], " ").trim().to_string()
}

#[async_trait]
impl Classifier for FakeClassifier {
    async fn classify(&self, filename: &str, _context: Option<&str>) -> Result<ClassificationGuess> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let episode = regex::Regex::new(r"(?i)^(.+?)[. ]s(\d{2})e(\d{2})").unwrap();
        if let Some(caps) = episode.captures(filename) {
            return Ok(ClassificationGuess::episode(
                words(&caps[1]),
                caps[2].parse().unwrap(),
                caps[3].parse().unwrap(),
            ));
        }

        let movie = regex::Regex::new(r"^(.+?)[. ]\(?(\d{4})\b").unwrap();
        if let Some(caps) = movie.captures(filename) {
            return Ok(ClassificationGuess::movie(
                words(&caps[1]),
                caps[2].parse().ok(),
            ));
        }

        Err(Error::ClassificationFailed(format!("{}: unrecognised", filename)))
    }
}

struct FakeMovie {
    id: String,
    title: String,
    year: u16,
    collection: Option<String>,
}

struct FakeShow {
    id: String,
    title: String,
    year: u16,
    episodes: HashSet<(u16, u16)>,
}

/// In-memory metadata service counting every query.
#[derive(Default)]
pub struct FakeMetadata {
    movies: Vec<FakeMovie>,
    shows: Vec<FakeShow>,
    pub calls: AtomicUsize,
    pub failing: AtomicBool,
}

impl FakeMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn movie(mut self, title: &str, year: u16, id: &str) -> Self {
        self.movies.push(FakeMovie {
            id: id.to_string(),
            title: title.to_string(),
            year,
            collection: None,
        });
        self
    }

    pub fn movie_in(mut self, title: &str, year: u16, id: &str, collection: &str) -> Self {
        self.movies.push(FakeMovie {
            id: id.to_string(),
            title: title.to_string(),
            year,
            collection: Some(collection.to_string()),
        });
        self
    }

    pub fn show(mut self, title: &str, year: u16, id: &str, episodes: &[(u16, u16)]) -> Self {
        self.shows.push(FakeShow {
            id: id.to_string(),
            title: title.to_string(),
            year,
            episodes: episodes.iter().copied().collect(),
        });
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl MetadataService for FakeMetadata {
    async fn search(&self, query: &MetadataQuery) -> Result<Vec<MetadataCandidate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::MetadataServiceError("HTTP 503".to_string()));
        }

        let same = |a: &str, b: &str| a.eq_ignore_ascii_case(b);
        let found = match query {
            MetadataQuery::Movie { title, year } => self
                .movies
                .iter()
                .filter(|m| same(&m.title, title) && year.map_or(true, |y| y == m.year))
                .map(|m| MetadataCandidate {
                    id: m.id.clone(),
                    title: m.title.clone(),
                    year: Some(m.year),
                    ..Default::default()
                })
                .collect(),
            MetadataQuery::MovieDetails { id } => self
                .movies
                .iter()
                .filter(|m| &m.id == id)
                .map(|m| MetadataCandidate {
                    id: m.id.clone(),
                    title: m.title.clone(),
                    year: Some(m.year),
                    collection: m.collection.clone(),
                    ..Default::default()
                })
                .collect(),
            MetadataQuery::Show { title, .. } => self
                .shows
                .iter()
                .filter(|s| same(&s.title, title))
                .map(|s| MetadataCandidate {
                    id: s.id.clone(),
                    title: s.title.clone(),
                    year: Some(s.year),
                    ..Default::default()
                })
                .collect(),
            MetadataQuery::Episode {
                show_id,
                season,
                episode,
            } => self
                .shows
                .iter()
                .filter(|s| &s.id == show_id && s.episodes.contains(&(*season, *episode)))
                .map(|s| MetadataCandidate {
                    id: format!("{}-{}-{}", s.id, season, episode),
                    title: s.title.clone(),
                    episode_title: Some(format!("Episode {}", episode)),
                    ..Default::default()
                })
                .collect(),
        };
        Ok(found)
    }
}

/// Grouper with fixed answers, recording every title it is sent.
#[derive(Default)]
pub struct FakeGrouper {
    groups: Vec<(MediaKind, String, Vec<String>)>,
    pub sent: Mutex<Vec<(MediaKind, Vec<String>)>>,
}

impl FakeGrouper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group(mut self, kind: MediaKind, name: &str, titles: &[&str]) -> Self {
        self.groups.push((
            kind,
            name.to_string(),
            titles.iter().map(|t| t.to_string()).collect(),
        ));
        self
    }

    /// Every title sent so far, in request order.
    pub fn sent_titles(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .flat_map(|(_, titles)| titles.clone())
            .collect()
    }
}

#[async_trait]
impl Grouper for FakeGrouper {
    async fn group(&self, kind: MediaKind, titles: &[String]) -> Result<Vec<Grouping>> {
        self.sent.lock().unwrap().push((kind, titles.to_vec()));
        Ok(self
            .groups
            .iter()
            .filter(|(k, _, _)| *k == kind)
            .map(|(_, name, members)| Grouping {
                group_name: name.clone(),
                titles: members.clone(),
            })
            .collect())
    }
}

/// Inbox, library and cache file inside one temp directory.
pub struct Workspace {
    pub dir: tempfile::TempDir,
    pub inbox: PathBuf,
    pub library: PathBuf,
    pub cache: PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = tempfile::TempDir::new().unwrap();
        // Runs canonicalize their roots; match that so paths compare equal
        let base = dir.path().canonicalize().unwrap();
        let inbox = base.join("Orphaned");
        let library = base.join("Shared Media");
        std::fs::create_dir_all(&inbox).unwrap();
        std::fs::create_dir_all(&library).unwrap();
        let cache = base.join("media_cache.csv");
        Self {
            dir,
            inbox,
            library,
            cache,
        }
    }

    /// Create a file under the inbox with the given content.
    pub fn add(&self, relative: &str, content: &str) -> PathBuf {
        write_file(&self.inbox.join(relative), content)
    }

    /// Create a file under the library with the given content.
    pub fn add_to_library(&self, relative: &str, content: &str) -> PathBuf {
        write_file(&self.library.join(relative), content)
    }

    /// Fresh pipeline over this workspace's cache file, as a new process would see it.
    pub fn pipeline(
        &self,
        classifier: &Arc<FakeClassifier>,
        service: &Arc<FakeMetadata>,
        dry_run: bool,
        bypass_cache: bool,
    ) -> Pipeline<CsvCache> {
        let cache = CsvCache::open(&self.cache).unwrap();
        Pipeline::new(
            classifier.clone(),
            service.clone(),
            cache,
            PipelineOptions {
                dry_run,
                bypass_cache,
                concurrency: 2,
                show_progress: false,
            },
        )
    }
}

pub fn write_file(path: &Path, content: &str) -> PathBuf {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
    path.to_path_buf()
}
