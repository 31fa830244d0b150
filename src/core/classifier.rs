//! Filename classifier.
//!
//! Asks a language model what a raw filename is (movie, show episode or
//! unclear) and extracts the hints the metadata lookup needs. Model output is
//! treated as untrusted: fields may arrive as numbers or strings, confidence on
//! either a 0-1 or 0-100 scale, and everything is range-checked before use.

use crate::services::ollama::OllamaClient;
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::Datelike;
use serde::{Deserialize, Deserializer, Serialize};

/// What the classifier thinks a file is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuessKind {
    Movie,
    Show,
    Ambiguous,
}

/// Structured guess for one filename.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationGuess {
    pub kind: GuessKind,
    /// Movie title or show name.
    pub title_hint: String,
    pub year_hint: Option<u16>,
    pub season_hint: Option<u16>,
    pub episode_hint: Option<u16>,
    /// Franchise or grouping folder suggested by the model.
    pub collection_hint: Option<String>,
    /// Confidence score (0.0 - 1.0).
    pub confidence: f32,
}

impl ClassificationGuess {
    /// A movie guess with full confidence.
    pub fn movie(title: impl Into<String>, year: Option<u16>) -> Self {
        Self {
            kind: GuessKind::Movie,
            title_hint: title.into(),
            year_hint: year,
            season_hint: None,
            episode_hint: None,
            collection_hint: None,
            confidence: 1.0,
        }
    }

    /// A show-episode guess with full confidence.
    pub fn episode(show: impl Into<String>, season: u16, episode: u16) -> Self {
        Self {
            kind: GuessKind::Show,
            title_hint: show.into(),
            year_hint: None,
            season_hint: Some(season),
            episode_hint: Some(episode),
            collection_hint: None,
            confidence: 1.0,
        }
    }
}

/// Classifier capability.
///
/// `context` is the path of the file's directory relative to the scanned root,
/// which often carries the show name or year the filename lacks.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, filename: &str, context: Option<&str>) -> Result<ClassificationGuess>;
}

/// Model output, as loosely typed as models tend to produce it.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawGuess {
    kind: Option<String>,
    category: Option<String>,
    title: Option<String>,
    show_name: Option<String>,
    #[serde(deserialize_with = "lenient_u16")]
    year: Option<u16>,
    #[serde(deserialize_with = "lenient_u16")]
    season: Option<u16>,
    #[serde(deserialize_with = "lenient_u16")]
    episode: Option<u16>,
    collection: Option<String>,
    #[serde(deserialize_with = "lenient_f32")]
    confidence: Option<f32>,
}

/// Accept `5`, `"05"`, `" 5 "` or `null`; anything else becomes `None`.
fn lenient_u16<'de, D>(deserializer: D) -> std::result::Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .and_then(|n| u16::try_from(n).ok()),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_f32<'de, D>(deserializer: D) -> std::result::Result<Option<f32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64().map(|f| f as f32),
        Some(serde_json::Value::String(s)) => s.trim().trim_end_matches('%').parse().ok(),
        _ => None,
    })
}

fn parse_kind(kind: Option<&str>) -> GuessKind {
    let Some(kind) = kind else {
        return GuessKind::Ambiguous;
    };
    match kind.trim().to_lowercase().replace(['_', '-'], " ").as_str() {
        "movie" | "movies" | "film" => GuessKind::Movie,
        "show" | "tv" | "tv show" | "tv shows" | "series" | "episode" => GuessKind::Show,
        _ => GuessKind::Ambiguous,
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a raw model response into a guess.
///
/// Fails with `ClassificationFailed` when the response is not a JSON object.
/// Field plausibility is checked separately by [`validate_guess`].
pub fn parse_guess(response: &str, filename: &str) -> Result<ClassificationGuess> {
    let raw: RawGuess = serde_json::from_str(response.trim()).map_err(|e| {
        Error::ClassificationFailed(format!("{}: unparseable model output ({})", filename, e))
    })?;

    // Models sometimes answer on a 0-100 scale
    let raw_confidence = raw.confidence.unwrap_or(0.5);
    let confidence = if raw_confidence > 1.0 {
        raw_confidence / 100.0
    } else {
        raw_confidence
    };

    let kind = parse_kind(raw.kind.or(raw.category).as_deref());
    let title = match kind {
        GuessKind::Show => non_blank(raw.show_name).or(non_blank(raw.title)),
        _ => non_blank(raw.title).or(non_blank(raw.show_name)),
    };

    Ok(ClassificationGuess {
        kind,
        title_hint: title.unwrap_or_default(),
        year_hint: raw.year,
        season_hint: raw.season,
        episode_hint: raw.episode,
        collection_hint: non_blank(raw.collection),
        confidence: confidence.clamp(0.0, 1.0),
    })
}

/// Season and episode numbers written into a filename (`S01E02`, `1x02`).
pub fn extract_episode_hints(filename: &str) -> (Option<u16>, Option<u16>) {
    if let Ok(re) = regex::Regex::new(r"(?i)\bs(\d{1,2})[ ._-]?e(\d{1,4})") {
        if let Some(caps) = re.captures(filename) {
            return (caps[1].parse().ok(), caps[2].parse().ok());
        }
    }
    if let Ok(re) = regex::Regex::new(r"\b(\d{1,2})x(\d{2,3})\b") {
        if let Some(caps) = re.captures(filename) {
            return (caps[1].parse().ok(), caps[2].parse().ok());
        }
    }
    (None, None)
}

/// Range-check a guess and settle what kind of media it describes.
///
/// - years outside 1900..=now+5 are dropped (and confidence halved)
/// - seasons above 100 and episodes outside 1..=1000 are dropped
/// - missing season/episode are recovered from the filename when possible
/// - an ambiguous guess with an episode number is a show, otherwise a movie
/// - a show without an episode number cannot be placed and fails
/// - a show with an episode but no season is season 1
pub fn validate_guess(
    mut guess: ClassificationGuess,
    filename: &str,
    min_confidence: f32,
) -> Result<ClassificationGuess> {
    if let Some(year) = guess.year_hint {
        let current_year = chrono::Utc::now().year() as u16;
        if year < 1900 || year > current_year + 5 {
            tracing::debug!("Implausible year {} for {}, ignoring", year, filename);
            guess.year_hint = None;
            guess.confidence *= 0.5;
        }
    }
    if guess.season_hint.is_some_and(|s| s > 100) {
        guess.season_hint = None;
    }
    if guess.episode_hint.is_some_and(|e| e == 0 || e > 1000) {
        guess.episode_hint = None;
    }

    guess.title_hint = guess.title_hint.trim().to_string();
    if guess.title_hint.is_empty() {
        return Err(Error::ClassificationFailed(format!(
            "{}: no title recognised",
            filename
        )));
    }

    if guess.kind != GuessKind::Movie
        && (guess.season_hint.is_none() || guess.episode_hint.is_none())
    {
        let (season, episode) = extract_episode_hints(filename);
        guess.season_hint = guess.season_hint.or(season);
        guess.episode_hint = guess.episode_hint.or(episode);
    }

    if guess.kind == GuessKind::Ambiguous {
        guess.kind = if guess.episode_hint.is_some() {
            GuessKind::Show
        } else {
            GuessKind::Movie
        };
        tracing::debug!("Ambiguous guess for {} treated as {:?}", filename, guess.kind);
    }

    if guess.kind == GuessKind::Show {
        if guess.episode_hint.is_none() {
            return Err(Error::ClassificationFailed(format!(
                "{}: show without an episode number",
                filename
            )));
        }
        guess.season_hint.get_or_insert(1);
    }

    if guess.confidence < min_confidence {
        return Err(Error::ClassificationFailed(format!(
            "{}: confidence {:.2} below {:.2}",
            filename, guess.confidence, min_confidence
        )));
    }

    Ok(guess)
}

/// Classifier backed by a local Ollama model.
pub struct OllamaClassifier {
    client: OllamaClient,
    min_confidence: f32,
}

impl OllamaClassifier {
    pub fn new(client: OllamaClient, min_confidence: f32) -> Self {
        Self {
            client,
            min_confidence,
        }
    }

    /// Generate the prompt for classifying a filename.
    fn generate_prompt(&self, filename: &str, context: Option<&str>) -> String {
        let context = context.filter(|c| !c.is_empty()).unwrap_or("(none)");

        format!(
            r#"You are an expert at identifying video files from their names.

Filename: {filename}
Folder: {context}

Decide whether this is a movie or an episode of a TV show and extract:
1. kind: "movie", "show", or "ambiguous" if you cannot tell
2. title: the movie title, or the show name for episodes
3. year: release year (4 digits) if present
4. season: season number (episodes only, e.g. S01 means 1)
5. episode: episode number (episodes only, e.g. E05 means 5)
6. collection: franchise name if the movie belongs to one, otherwise null
7. confidence: your confidence in this answer, between 0.0 and 1.0

Notes:
- Ignore resolution (1080p, 4K, 2160p), codecs (x265, HEVC), audio (DTS, AAC) and release groups
- Sequel numbers (2, 3, II, III) are part of the title
- Edition labels (Director's Cut, Extended, Unrated, IMAX) are not part of the title
- The folder often names the show or season when the filename does not
- Use null for anything you cannot determine

Return only the JSON object:
{{"kind": "...", "title": "...", "year": ..., "season": ..., "episode": ..., "collection": ..., "confidence": ...}}"#
        )
    }
}

#[async_trait]
impl Classifier for OllamaClassifier {
    async fn classify(&self, filename: &str, context: Option<&str>) -> Result<ClassificationGuess> {
        let prompt = self.generate_prompt(filename, context);

        tracing::debug!("Classifying filename: {}", filename);
        let start = std::time::Instant::now();

        let response = self
            .client
            .generate_with_format(&prompt, Some("json"))
            .await
            .map_err(|e| Error::ClassificationFailed(format!("{}: {}", filename, e)))?;

        tracing::debug!(
            "Model answered in {:.1}s: {}",
            start.elapsed().as_secs_f32(),
            response.response
        );

        let guess = parse_guess(&response.response, filename)?;
        validate_guess(guess, filename, self.min_confidence)
    }
}
