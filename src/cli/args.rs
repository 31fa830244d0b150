//! Command line argument definitions.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Media Reorg - resolve, cache and organize your movie and TV files
#[derive(Parser, Debug)]
#[command(name = "media-reorg")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Skip preflight checks
    #[arg(long, global = true)]
    pub skip_preflight: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Switches shared by the commands that move files.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Cache file (overrides the config file)
    #[arg(long, value_name = "FILE")]
    pub cache: Option<PathBuf>,

    /// Show what would be moved without touching any media file
    #[arg(long)]
    pub dry_run: bool,

    /// Ignore cached metadata and resolve every file again
    #[arg(long)]
    pub no_cache: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Move files from the inbox into the library
    Organize {
        /// Inbox directory (overrides the config file)
        #[arg(short, long, value_name = "DIR")]
        source: Option<PathBuf>,

        /// Library directory (overrides the config file)
        #[arg(short, long, value_name = "DIR")]
        library: Option<PathBuf>,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Re-apply the naming convention to the whole library
    Reorganize {
        /// Library directory (overrides the config file)
        #[arg(short, long, value_name = "DIR")]
        library: Option<PathBuf>,

        /// Do not ask the model to group uncollected titles into collections
        #[arg(long)]
        no_group: bool,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Inspect the metadata cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Run the preflight checks only
    Check,
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Show entry counts
    Stats {
        /// Cache file (overrides the config file)
        #[arg(long, value_name = "FILE")]
        cache: Option<PathBuf>,
    },
}
