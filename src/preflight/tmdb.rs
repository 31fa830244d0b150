//! TMDB API preflight check.

use super::CheckResult;
use crate::models::config::TmdbConfig;
use crate::services::tmdb::{TmdbClient, TmdbSettings};

/// Check if TMDB API is accessible.
pub async fn check(config: &TmdbConfig) -> CheckResult {
    match TmdbSettings::from_env(&config.language) {
        Ok(settings) => {
            if TmdbClient::new(settings).verify_api_key().await {
                CheckResult::ok("TMDB API", "connected")
            } else {
                CheckResult::fail(
                    "TMDB API",
                    "key rejected or service unreachable",
                    "Check your TMDB_API_KEY environment variable and network connection",
                )
            }
        }
        Err(_) => CheckResult::fail(
            "TMDB API",
            "API key not configured",
            "Set TMDB_API_KEY environment variable",
        ),
    }
}
