//! Collection grouper.
//!
//! Asks a language model to sort the titles of one category into collections
//! ("Pixar Movies", "Science Fiction TV Shows") and hands back a folder name
//! per title. Used by reorganize for records the metadata service left
//! without a collection.

use crate::models::media::MediaKind;
use crate::services::ollama::OllamaClient;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

/// Titles sent to the grouper per request.
pub const GROUPING_CHUNK: usize = 500;

/// One suggested collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grouping {
    pub group_name: String,
    pub titles: Vec<String>,
}

/// Grouping capability.
#[async_trait]
pub trait Grouper: Send + Sync {
    /// Group `titles` of one category into collections. Titles the grouper
    /// leaves out simply stay ungrouped.
    async fn group(&self, kind: MediaKind, titles: &[String]) -> Result<Vec<Grouping>>;
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawGroupings {
    groupings: Vec<RawGrouping>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawGrouping {
    group_name: Option<String>,
    titles: Vec<serde_json::Value>,
}

/// Parse a model response into groupings.
///
/// Entries without a name or without any string titles are dropped.
pub fn parse_groupings(response: &str) -> Result<Vec<Grouping>> {
    let raw: RawGroupings = serde_json::from_str(response.trim())
        .map_err(|e| Error::MetadataServiceError(format!("unparseable grouping output ({})", e)))?;

    Ok(raw
        .groupings
        .into_iter()
        .filter_map(|g| {
            let group_name = g.group_name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())?;
            let titles: Vec<String> = g
                .titles
                .into_iter()
                .filter_map(|t| t.as_str().map(|s| s.trim().to_string()))
                .filter(|t| !t.is_empty())
                .collect();
            if titles.is_empty() {
                None
            } else {
                Some(Grouping { group_name, titles })
            }
        })
        .collect())
}

fn title_key(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Map each of `titles` to a suggested collection name.
///
/// Titles are sent in chunks of [`GROUPING_CHUNK`]. A failed chunk is logged
/// and leaves its titles ungrouped. The map is keyed by the lowercased title,
/// see [`lookup_collection`]. Names the grouper invents for titles it was not
/// given are ignored; the first grouping to claim a title wins.
pub async fn suggest_collections(
    grouper: &dyn Grouper,
    kind: MediaKind,
    titles: &[String],
) -> HashMap<String, String> {
    let mut suggestions = HashMap::new();

    for chunk in titles.chunks(GROUPING_CHUNK) {
        let groupings = match grouper.group(kind, chunk).await {
            Ok(groupings) => groupings,
            Err(e) => {
                tracing::warn!("Grouping {} {} titles failed: {}", chunk.len(), kind, e);
                continue;
            }
        };

        let asked: HashMap<String, &String> = chunk.iter().map(|t| (title_key(t), t)).collect();
        for grouping in groupings {
            for title in &grouping.titles {
                let key = title_key(title);
                if asked.contains_key(&key) {
                    suggestions
                        .entry(key)
                        .or_insert_with(|| grouping.group_name.clone());
                }
            }
        }
    }

    tracing::debug!("Grouper placed {} of {} {} titles", suggestions.len(), titles.len(), kind);
    suggestions
}

/// Suggested collection for `title`, if any.
pub fn lookup_collection<'a>(suggestions: &'a HashMap<String, String>, title: &str) -> Option<&'a str> {
    suggestions.get(&title_key(title)).map(String::as_str)
}

/// Grouper backed by an Ollama model.
pub struct OllamaGrouper {
    client: OllamaClient,
}

impl OllamaGrouper {
    pub fn new(client: OllamaClient) -> Self {
        Self { client }
    }

    fn generate_prompt(&self, kind: MediaKind, titles: &[String]) -> String {
        let category = match kind {
            MediaKind::Movie => "Movies",
            MediaKind::Episode => "TV Shows",
        };
        let list = titles.join(", ");

        format!(
            r#"Given the list of titles in the '{category}' category:
{list}

Group these titles into sensible collections or subgroupings based on common themes, franchises or studios, such as 'Disney Movies', 'Pixar Movies', or 'Science Fiction TV Shows'.
Use each title exactly as written above and put it in at most one group. Leave out titles that do not fit any group.

Return only the JSON object:
{{"groupings": [{{"group_name": "...", "titles": ["...", "..."]}}]}}"#
        )
    }
}

#[async_trait]
impl Grouper for OllamaGrouper {
    async fn group(&self, kind: MediaKind, titles: &[String]) -> Result<Vec<Grouping>> {
        if titles.is_empty() {
            return Ok(Vec::new());
        }
        let prompt = self.generate_prompt(kind, titles);

        tracing::debug!("Grouping {} {} titles", titles.len(), kind);
        let response = self
            .client
            .generate_with_format(&prompt, Some("json"))
            .await
            .map_err(|e| Error::MetadataServiceError(format!("grouping request failed: {}", e)))?;

        parse_groupings(&response.response)
    }
}
