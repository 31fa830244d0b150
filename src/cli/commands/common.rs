//! Wiring and output shared by the organize and reorganize commands.

use crate::cli::args::RunArgs;
use crate::core::cache::CsvCache;
use crate::core::classifier::OllamaClassifier;
use crate::core::pipeline::{Pipeline, PipelineOptions};
use crate::models::config::Config;
use crate::models::plan::{PlanOutcome, RunReport};
use crate::services::ollama::OllamaClient;
use crate::services::tmdb::{TmdbClient, TmdbSettings};
use crate::Result;
use colored::Colorize;
use std::sync::Arc;

/// Build the production pipeline.
///
/// Fails before any file is touched when the TMDB key is missing or the cache
/// file exists but cannot be read.
pub fn build_pipeline(config: &Config, run: &RunArgs) -> Result<Pipeline<CsvCache>> {
    let tmdb = TmdbClient::new(TmdbSettings::from_env(&config.tmdb.language)?);
    let cache = CsvCache::open(&config.paths.cache_path)?;
    let classifier = OllamaClassifier::new(
        OllamaClient::new(config.ollama.clone())?,
        config.pipeline.min_confidence,
    );

    let options = PipelineOptions {
        dry_run: run.dry_run,
        bypass_cache: run.no_cache,
        concurrency: config.pipeline.concurrency,
        show_progress: true,
    };

    Ok(Pipeline::new(
        Arc::new(classifier),
        Arc::new(tmdb),
        cache,
        options,
    ))
}

/// Print the run summary.
pub fn print_report(report: &RunReport) {
    println!();
    let title = if report.dry_run {
        "[DRY RUN] Summary"
    } else {
        "Summary"
    };
    println!("{}", title.bold().green());
    println!("  {} {}", "Run:".bold(), report.run_id);
    println!("  {} {}", "Files scanned:".bold(), report.scanned);
    println!("  {} {}", "From cache:".bold(), report.cache_hits);
    println!("  {} {}", "Resolved:".bold(), report.resolved);
    if report.grouped > 0 {
        println!("  {} {}", "Grouped:".bold(), report.grouped);
    }

    let moved = if report.dry_run {
        report.count(PlanOutcome::Pending)
    } else {
        report.count(PlanOutcome::Applied)
    };
    let moved_label = if report.dry_run { "Would move:" } else { "Moved:" };
    println!("  {} {}", moved_label.bold(), moved);
    println!(
        "  {} {}",
        "Already in place:".bold(),
        report.count(PlanOutcome::Skipped)
    );
    println!(
        "  {} {}",
        "Conflicts:".bold(),
        report.count(PlanOutcome::Conflict)
    );
    println!("  {} {}", "Failed:".bold(), report.failures.len());
    println!("  {} {}", "Stale cache entries:".bold(), report.purged);
    if report.pruned_dirs > 0 {
        println!("  {} {}", "Empty folders removed:".bold(), report.pruned_dirs);
    }

    let moves: Vec<_> = report.moves().collect();
    if !moves.is_empty() {
        println!();
        println!("{}", "Moves".bold().cyan());
        for plan in moves {
            println!(
                "  {} -> {}",
                plan.source.display(),
                plan.destination.display().to_string().green()
            );
            for sidecar in &plan.failed_sidecars {
                println!("    {} sidecar left behind: {}", "!".yellow(), sidecar.display());
            }
        }
    }

    let conflicts: Vec<_> = report
        .plans
        .iter()
        .filter(|p| p.outcome == PlanOutcome::Conflict)
        .collect();
    if !conflicts.is_empty() {
        println!();
        println!("{}", "Conflicts".bold().yellow());
        for plan in conflicts {
            println!(
                "  {} -> {} ({})",
                plan.source.display(),
                plan.destination.display(),
                plan.note.as_deref().unwrap_or("occupied")
            );
        }
    }

    if !report.failures.is_empty() {
        println!();
        println!("{}", "Failures".bold().red());
        for failure in &report.failures {
            println!(
                "  [{}] {}: {}",
                failure.stage,
                failure.path.display(),
                failure.reason
            );
        }
    }
}
