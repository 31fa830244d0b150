//! Reorganize command implementation.
//!
//! Re-applies the naming convention across the whole library.

use super::common::{build_pipeline, print_report};
use crate::cli::args::RunArgs;
use crate::core::grouper::OllamaGrouper;
use crate::core::reorganizer::Reorganizer;
use crate::models::config::Config;
use crate::services::ollama::OllamaClient;
use crate::Result;
use colored::Colorize;
use std::sync::Arc;

/// Execute the reorganize command.
pub async fn reorganize(config: &Config, run: &RunArgs, group: bool) -> Result<()> {
    let library = &config.paths.library_root;

    println!("{}", "Reorganizing library...".bold().cyan());
    println!("  {} {}", "Library:".bold(), library.display());
    println!("  {} {}", "Cache:".bold(), config.paths.cache_path.display());
    if run.dry_run {
        println!("{}", "  Dry run: no files will be moved".yellow());
    }

    let pipeline = build_pipeline(config, run)?;
    let mut reorganizer = Reorganizer::new(&pipeline).keep_alive(&config.paths.source_root);
    if group {
        let grouper = OllamaGrouper::new(OllamaClient::new(config.ollama.clone())?);
        reorganizer = reorganizer.with_grouper(Arc::new(grouper));
    }
    let report = reorganizer.run(library).await?;

    print_report(&report);
    Ok(())
}
