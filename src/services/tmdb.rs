//! TMDB API client.

use crate::core::resolver::{MetadataCandidate, MetadataQuery, MetadataService};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;

const TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";

/// Prefix of identifiers minted from TMDB ids.
const ID_PREFIX: &str = "tmdb";

/// TMDB credentials and request settings.
#[derive(Debug, Clone)]
pub struct TmdbSettings {
    /// API key or Bearer token (JWT)
    pub api_key: String,
    pub language: String,
    /// Whether to use Bearer token authentication (API v4 style)
    pub use_bearer: bool,
}

impl TmdbSettings {
    /// Read the key from `TMDB_API_KEY`.
    /// Supports both API key (v3) and Bearer token (v4) formats.
    pub fn from_env(language: &str) -> Result<Self> {
        let api_key = std::env::var("TMDB_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(Error::TmdbApiKeyMissing)?;
        Ok(Self::new(api_key, language))
    }

    pub fn new(api_key: impl Into<String>, language: &str) -> Self {
        let api_key = api_key.into();
        // Bearer tokens start with "eyJ" (base64 encoded JWT header)
        let use_bearer = api_key.starts_with("eyJ");

        Self {
            api_key,
            language: language.to_string(),
            use_bearer,
        }
    }
}

/// TMDB API client.
#[derive(Clone)]
pub struct TmdbClient {
    settings: TmdbSettings,
    client: reqwest::Client,
}

/// Movie search result.
#[derive(Debug, Deserialize)]
pub struct MovieSearchResult {
    pub results: Vec<MovieSearchItem>,
}

/// Movie search item.
#[derive(Debug, Deserialize)]
pub struct MovieSearchItem {
    pub id: u64,
    pub title: String,
    pub original_title: Option<String>,
    pub release_date: Option<String>,
}

/// Movie details.
#[derive(Debug, Deserialize)]
pub struct MovieDetails {
    pub id: u64,
    pub title: String,
    pub original_title: Option<String>,
    pub release_date: Option<String>,
    pub belongs_to_collection: Option<CollectionRef>,
}

/// Collection a movie belongs to.
#[derive(Debug, Deserialize)]
pub struct CollectionRef {
    pub id: u64,
    pub name: String,
}

/// TV show search result.
#[derive(Debug, Deserialize)]
pub struct TvSearchResult {
    pub results: Vec<TvSearchItem>,
}

/// TV show search item.
#[derive(Debug, Deserialize)]
pub struct TvSearchItem {
    pub id: u64,
    pub name: String,
    pub original_name: Option<String>,
    pub first_air_date: Option<String>,
}

/// Episode details.
#[derive(Debug, Deserialize)]
pub struct EpisodeDetails {
    pub id: u64,
    pub name: String,
    pub episode_number: u16,
    pub season_number: u16,
    pub air_date: Option<String>,
}

/// Year part of a `YYYY-MM-DD` date.
fn year_from_date(date: Option<&str>) -> Option<u16> {
    date.and_then(|d| d.split('-').next())
        .and_then(|y| y.parse().ok())
        .filter(|y| *y > 0)
}

fn format_id(id: u64) -> String {
    format!("{}{}", ID_PREFIX, id)
}

fn parse_id(id: &str) -> Option<u64> {
    id.strip_prefix(ID_PREFIX)?.parse().ok()
}

impl From<MovieSearchItem> for MetadataCandidate {
    fn from(item: MovieSearchItem) -> Self {
        Self {
            id: format_id(item.id),
            year: year_from_date(item.release_date.as_deref()),
            title: item.title,
            original_title: item.original_title,
            collection: None,
            episode_title: None,
        }
    }
}

impl From<MovieDetails> for MetadataCandidate {
    fn from(details: MovieDetails) -> Self {
        Self {
            id: format_id(details.id),
            year: year_from_date(details.release_date.as_deref()),
            title: details.title,
            original_title: details.original_title,
            collection: details.belongs_to_collection.map(|c| c.name),
            episode_title: None,
        }
    }
}

impl From<TvSearchItem> for MetadataCandidate {
    fn from(item: TvSearchItem) -> Self {
        Self {
            id: format_id(item.id),
            year: year_from_date(item.first_air_date.as_deref()),
            title: item.name,
            original_title: item.original_name,
            collection: None,
            episode_title: None,
        }
    }
}

impl TmdbClient {
    /// Create a new TMDB client.
    pub fn new(settings: TmdbSettings) -> Self {
        let client = reqwest::Client::new();
        Self { settings, client }
    }

    /// Build a request with proper authentication.
    fn build_request(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self.client.get(url);
        if self.settings.use_bearer {
            request.header("Authorization", format!("Bearer {}", self.settings.api_key))
        } else {
            request
        }
    }

    /// Build URL with optional api_key parameter (only for v3 style).
    fn build_url(&self, path: &str, extra_params: &str) -> String {
        if self.settings.use_bearer {
            format!(
                "{}/{}?language={}{}",
                TMDB_BASE_URL, path, self.settings.language, extra_params
            )
        } else {
            format!(
                "{}/{}?api_key={}&language={}{}",
                TMDB_BASE_URL, path, self.settings.api_key, self.settings.language, extra_params
            )
        }
    }

    /// GET a JSON document; `Ok(None)` on 404.
    async fn get_optional<T: DeserializeOwned>(&self, url: &str) -> Result<Option<T>> {
        let resp = self.build_request(url).send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(resp.error_for_status()?.json().await?))
    }

    /// Verify API key is valid.
    pub async fn verify_api_key(&self) -> bool {
        let url = if self.settings.use_bearer {
            format!("{}/authentication", TMDB_BASE_URL)
        } else {
            format!(
                "{}/authentication?api_key={}",
                TMDB_BASE_URL, self.settings.api_key
            )
        };

        match self.build_request(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    /// Search for movies.
    pub async fn search_movie(&self, query: &str, year: Option<u16>) -> Result<Vec<MovieSearchItem>> {
        let year_param = year.map(|y| format!("&year={}", y)).unwrap_or_default();
        let url = self.build_url(
            "search/movie",
            &format!("&query={}{}", urlencoding::encode(query), year_param),
        );

        let resp: MovieSearchResult = self
            .build_request(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp.results)
    }

    /// Get movie details, including its collection.
    pub async fn get_movie_details(&self, movie_id: u64) -> Result<Option<MovieDetails>> {
        let url = self.build_url(&format!("movie/{}", movie_id), "");
        self.get_optional(&url).await
    }

    /// Search for TV shows.
    pub async fn search_tv(&self, query: &str, year: Option<u16>) -> Result<Vec<TvSearchItem>> {
        let year_param = year
            .map(|y| format!("&first_air_date_year={}", y))
            .unwrap_or_default();
        let url = self.build_url(
            "search/tv",
            &format!("&query={}{}", urlencoding::encode(query), year_param),
        );

        let resp: TvSearchResult = self
            .build_request(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp.results)
    }

    /// Get episode details; `None` when the episode does not exist.
    pub async fn get_episode_details(
        &self,
        tv_id: u64,
        season_number: u16,
        episode_number: u16,
    ) -> Result<Option<EpisodeDetails>> {
        let url = self.build_url(
            &format!(
                "tv/{}/season/{}/episode/{}",
                tv_id, season_number, episode_number
            ),
            "",
        );
        self.get_optional(&url).await
    }
}

#[async_trait]
impl MetadataService for TmdbClient {
    async fn search(&self, query: &MetadataQuery) -> Result<Vec<MetadataCandidate>> {
        match query {
            MetadataQuery::Movie { title, year } => Ok(self
                .search_movie(title, *year)
                .await?
                .into_iter()
                .map(MetadataCandidate::from)
                .collect()),
            MetadataQuery::Show { title, year } => Ok(self
                .search_tv(title, *year)
                .await?
                .into_iter()
                .map(MetadataCandidate::from)
                .collect()),
            MetadataQuery::MovieDetails { id } => {
                let Some(movie_id) = parse_id(id) else {
                    return Ok(Vec::new());
                };
                Ok(self
                    .get_movie_details(movie_id)
                    .await?
                    .map(MetadataCandidate::from)
                    .into_iter()
                    .collect())
            }
            MetadataQuery::Episode {
                show_id,
                season,
                episode,
            } => {
                let tv_id = parse_id(show_id).ok_or_else(|| {
                    Error::MetadataServiceError(format!("not a TMDB show id: {}", show_id))
                })?;
                let details = self.get_episode_details(tv_id, *season, *episode).await?;
                Ok(details
                    .map(|ep| MetadataCandidate {
                        id: format_id(ep.id),
                        title: ep.name.clone(),
                        original_title: None,
                        year: year_from_date(ep.air_date.as_deref()),
                        collection: None,
                        episode_title: Some(ep.name),
                    })
                    .into_iter()
                    .collect())
            }
        }
    }
}
