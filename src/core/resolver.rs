//! Metadata resolution.
//!
//! Turns a classifier guess into a canonical [`MetadataRecord`] by querying a
//! metadata service and picking the best candidate deterministically.

use crate::core::classifier::{ClassificationGuess, GuessKind};
use crate::models::media::{MediaDetails, MetadataRecord};
use crate::{Error, Result};
use async_trait::async_trait;
use std::cmp::Reverse;
use std::sync::Arc;

/// A request to the metadata service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MetadataQuery {
    /// Search movies by title, optionally narrowed to a release year.
    Movie { title: String, year: Option<u16> },
    /// Search shows by name, optionally narrowed to a first-air year.
    Show { title: String, year: Option<u16> },
    /// Fetch one movie by id (used for its collection).
    MovieDetails { id: String },
    /// Fetch one episode of a show; empty when it does not exist.
    Episode {
        show_id: String,
        season: u16,
        episode: u16,
    },
}

/// One result returned by the metadata service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataCandidate {
    pub id: String,
    pub title: String,
    pub original_title: Option<String>,
    pub year: Option<u16>,
    pub collection: Option<String>,
    pub episode_title: Option<String>,
}

/// Metadata service capability.
///
/// Results come back in the service's own relevance order. An empty list
/// means nothing matched; transport and API failures are errors.
#[async_trait]
pub trait MetadataService: Send + Sync {
    async fn search(&self, query: &MetadataQuery) -> Result<Vec<MetadataCandidate>>;
}

/// Normalize a title for comparison.
fn normalize_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

/// Ordering key for a candidate; larger is better.
type Rank = (bool, Reverse<u32>, u8);

fn rank(candidate: &MetadataCandidate, query: &str, year: Option<u16>) -> Rank {
    let is_exact = normalize_title(&candidate.title) == query
        || candidate
            .original_title
            .as_deref()
            .is_some_and(|t| normalize_title(t) == query);

    let year_distance = match (year, candidate.year) {
        (Some(wanted), Some(got)) => u32::from(wanted.abs_diff(got)),
        (Some(_), None) => u32::MAX,
        (None, _) => 0,
    };

    let completeness = u8::from(candidate.year.is_some()) + u8::from(!candidate.id.is_empty());

    (is_exact, Reverse(year_distance), completeness)
}

/// Pick the best match for `title` / `year`.
///
/// Candidates are ordered by exact (case-insensitive) title match, then year
/// proximity, then completeness (year and id present), then the service's own
/// order. Returns `None` only for an empty list.
pub fn select_best_candidate<'a>(
    candidates: &'a [MetadataCandidate],
    title: &str,
    year: Option<u16>,
) -> Option<&'a MetadataCandidate> {
    let query = normalize_title(title);

    let mut ranked: Vec<(usize, Rank)> = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| (i, rank(c, &query, year)))
        .collect();
    // Stable sort keeps service order among equals
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    let (best_idx, best_rank) = *ranked.first()?;
    if let Some((second_idx, second_rank)) = ranked.get(1) {
        if *second_rank == best_rank {
            tracing::info!(
                "Ambiguous match for '{}': '{}' ({}) and '{}' ({}) rank equally, keeping service order",
                title,
                candidates[best_idx].title,
                candidates[best_idx].id,
                candidates[*second_idx].title,
                candidates[*second_idx].id
            );
        }
    }

    Some(&candidates[best_idx])
}

/// Keep not-found and service errors as they are; anything else from the
/// service boundary is a service error.
fn service_error(err: Error) -> Error {
    match err {
        Error::MetadataNotFound(_) | Error::MetadataServiceError(_) => err,
        other => Error::MetadataServiceError(other.to_string()),
    }
}

/// Resolves classifier guesses to canonical records.
#[derive(Clone)]
pub struct MetadataResolver {
    service: Arc<dyn MetadataService>,
}

impl MetadataResolver {
    pub fn new(service: Arc<dyn MetadataService>) -> Self {
        Self { service }
    }

    /// Resolve a guess to a canonical record.
    ///
    /// Fails with `MetadataNotFound` when nothing matches and with
    /// `MetadataServiceError` when the service itself fails.
    pub async fn resolve(&self, guess: &ClassificationGuess) -> Result<MetadataRecord> {
        let is_show = match guess.kind {
            GuessKind::Show => true,
            GuessKind::Movie => false,
            GuessKind::Ambiguous => guess.episode_hint.is_some(),
        };

        if is_show {
            self.resolve_episode(guess).await
        } else {
            self.resolve_movie(guess).await
        }
    }

    async fn search(&self, query: MetadataQuery) -> Result<Vec<MetadataCandidate>> {
        tracing::debug!("Metadata query: {:?}", query);
        self.service.search(&query).await.map_err(service_error)
    }

    async fn resolve_movie(&self, guess: &ClassificationGuess) -> Result<MetadataRecord> {
        let title = guess.title_hint.as_str();

        let mut candidates = self
            .search(MetadataQuery::Movie {
                title: title.to_string(),
                year: guess.year_hint,
            })
            .await?;

        // Release years on file names are often off by one region or another
        if candidates.is_empty() && guess.year_hint.is_some() {
            candidates = self
                .search(MetadataQuery::Movie {
                    title: title.to_string(),
                    year: None,
                })
                .await?;
        }

        let best = select_best_candidate(&candidates, title, guess.year_hint).ok_or_else(|| {
            Error::MetadataNotFound(match guess.year_hint {
                Some(year) => format!("movie '{}' ({})", title, year),
                None => format!("movie '{}'", title),
            })
        })?;

        let collection = match &best.collection {
            Some(collection) => Some(collection.clone()),
            None => self.movie_collection(&best.id).await,
        }
        .or_else(|| guess.collection_hint.clone());

        Ok(MetadataRecord::movie(best.title.clone(), best.year, best.id.clone())
            .with_collection(collection))
    }

    /// Collection of a movie, if the service knows one. Lookup failures only
    /// cost the grouping folder, so they are logged rather than propagated.
    async fn movie_collection(&self, id: &str) -> Option<String> {
        if id.is_empty() {
            return None;
        }
        match self
            .search(MetadataQuery::MovieDetails { id: id.to_string() })
            .await
        {
            Ok(details) => details.into_iter().find_map(|d| d.collection),
            Err(e) => {
                tracing::warn!("Collection lookup failed for {}: {}", id, e);
                None
            }
        }
    }

    async fn resolve_episode(&self, guess: &ClassificationGuess) -> Result<MetadataRecord> {
        let title = guess.title_hint.as_str();
        let season = guess.season_hint.unwrap_or(1);
        let episode = guess.episode_hint.ok_or_else(|| {
            Error::ClassificationFailed(format!("'{}' has no episode number", title))
        })?;

        let shows = self
            .search(MetadataQuery::Show {
                title: title.to_string(),
                year: guess.year_hint,
            })
            .await?;

        let show = select_best_candidate(&shows, title, guess.year_hint)
            .ok_or_else(|| Error::MetadataNotFound(format!("show '{}'", title)))?;

        let episodes = self
            .search(MetadataQuery::Episode {
                show_id: show.id.clone(),
                season,
                episode,
            })
            .await?;

        let Some(found) = episodes.into_iter().next() else {
            return Err(Error::MetadataNotFound(format!(
                "'{}' s{:02}e{:02}",
                show.title, season, episode
            )));
        };

        let mut record =
            MetadataRecord::episode(show.title.clone(), show.year, show.id.clone(), season, episode)
                .with_collection(show.collection.clone().or_else(|| guess.collection_hint.clone()));
        if let MediaDetails::Episode { episode_title, .. } = &mut record.details {
            *episode_title = found.episode_title.filter(|t| !t.trim().is_empty());
        }

        Ok(record)
    }
}
