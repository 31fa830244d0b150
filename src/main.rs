//! Media Reorg CLI
//!
//! A command-line tool for organizing movie and TV files into a canonical library layout.

use clap::Parser;
use media_reorg::cli::{
    args::{CacheAction, Cli, Commands},
    commands::{cache, organize, reorganize},
};
use media_reorg::models::config::{self, Config};
use media_reorg::preflight;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    let config = config::load_config();

    // Run the appropriate command
    match cli.command {
        Commands::Organize {
            source,
            library,
            run,
        } => {
            let config = config.with_overrides(
                source.as_deref(),
                library.as_deref(),
                run.cache.as_deref(),
            );
            if !cli.skip_preflight {
                run_preflight_checks(&config).await?;
            }
            organize::organize(&config, &run).await?;
        }

        Commands::Reorganize {
            library,
            no_group,
            run,
        } => {
            let config = config.with_overrides(None, library.as_deref(), run.cache.as_deref());
            if !cli.skip_preflight {
                run_preflight_checks(&config).await?;
            }
            reorganize::reorganize(&config, &run, !no_group).await?;
        }

        Commands::Cache { action } => match action {
            CacheAction::Stats { cache: path } => {
                let config = config.with_overrides(None, None, path.as_deref());
                cache::stats(&config.paths.cache_path)?;
            }
        },

        Commands::Check => {
            run_preflight_checks(&config).await?;
        }
    }

    Ok(())
}

/// Initialize the logging system.
fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("media_reorg=debug")
    } else {
        EnvFilter::new("media_reorg=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}

/// Run preflight checks and exit if any fail.
async fn run_preflight_checks(config: &Config) -> anyhow::Result<()> {
    use colored::Colorize;

    println!("{}", "Running preflight checks...".bold());
    println!();

    let results = preflight::run_preflight_checks(config).await;
    preflight::print_results(&results);

    println!();

    if !preflight::all_passed(&results) {
        anyhow::bail!("Preflight checks failed. Fix the issues above and try again.");
    }

    Ok(())
}
