//! Organize command implementation.
//!
//! Moves files from the inbox into their canonical place in the library.

use super::common::{build_pipeline, print_report};
use crate::cli::args::RunArgs;
use crate::models::config::Config;
use crate::Result;
use colored::Colorize;

/// Execute the organize command.
pub async fn organize(config: &Config, run: &RunArgs) -> Result<()> {
    let source = &config.paths.source_root;
    let library = &config.paths.library_root;

    println!("{}", "Organizing inbox...".bold().cyan());
    println!("  {} {}", "Source:".bold(), source.display());
    println!("  {} {}", "Library:".bold(), library.display());
    println!("  {} {}", "Cache:".bold(), config.paths.cache_path.display());
    if run.dry_run {
        println!("{}", "  Dry run: no files will be moved".yellow());
    }
    if run.no_cache {
        println!("{}", "  Cache bypass: every file is resolved again".yellow());
    }

    let pipeline = build_pipeline(config, run)?;
    let report = pipeline.organize(source, library).await?;

    print_report(&report);
    Ok(())
}
