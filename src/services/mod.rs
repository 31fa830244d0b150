//! HTTP clients for the external services.

pub mod ollama;
pub mod tmdb;
