//! Media Reorg Library
//!
//! Resolves movie and TV files to canonical metadata, caches the result by file
//! identity, and moves each file (with its sidecars) into a canonical library layout.

pub mod cli;
pub mod core;
pub mod error;
pub mod models;
pub mod preflight;
pub mod services;
pub mod utils;

pub use error::{Error, Result};
