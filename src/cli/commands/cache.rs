//! Cache command implementation.

use crate::core::cache::{CsvCache, MetadataCache};
use crate::models::media::MediaKind;
use crate::Result;
use colored::Colorize;
use std::path::Path;

/// Print entry counts for the cache at `path`.
pub fn stats(path: &Path) -> Result<()> {
    let cache = CsvCache::open(path)?;
    let counts = cache.count_by_kind();

    println!("{}", "Metadata cache".bold().cyan());
    println!("  {} {}", "Location:".bold(), cache.path().display());
    println!("  {} {}", "Entries:".bold(), cache.len());
    println!(
        "  {} {}",
        "Movies:".bold(),
        counts.get(&MediaKind::Movie).copied().unwrap_or(0)
    );
    println!(
        "  {} {}",
        "Episodes:".bold(),
        counts.get(&MediaKind::Episode).copied().unwrap_or(0)
    );

    if let Some(latest) = cache.entries().map(|e| e.resolved_at).max() {
        println!(
            "  {} {}",
            "Last resolution:".bold(),
            latest.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }

    Ok(())
}
