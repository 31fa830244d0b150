//! Library reorganizer.
//!
//! Re-applies the current naming convention to an already organized library.
//! Each file's identity key is re-derived, so files organized by a previous run
//! resolve straight from the cache; only files whose current location differs
//! from their canonical one are moved. An optional grouper files records that
//! have no collection into a suggested one.

use crate::core::cache::MetadataCache;
use crate::core::grouper::Grouper;
use crate::core::identity;
use crate::core::pipeline::Pipeline;
use crate::core::scanner;
use crate::models::media::IdentityKey;
use crate::models::plan::{PlanOutcome, RunReport};
use crate::utils::fs as fs_utils;
use crate::Result;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct Reorganizer<'a, C: MetadataCache> {
    pipeline: &'a Pipeline<C>,
    /// Other trees whose files must keep their cache entries (the inbox).
    keep_alive: Vec<PathBuf>,
    grouper: Option<Arc<dyn Grouper>>,
}

impl<'a, C: MetadataCache> Reorganizer<'a, C> {
    pub fn new(pipeline: &'a Pipeline<C>) -> Self {
        Self {
            pipeline,
            keep_alive: Vec::new(),
            grouper: None,
        }
    }

    /// Suggest collections for records that lack one.
    pub fn with_grouper(mut self, grouper: Arc<dyn Grouper>) -> Self {
        self.grouper = Some(grouper);
        self
    }

    /// Also treat files under `root` as live when purging the cache.
    pub fn keep_alive(mut self, root: &Path) -> Self {
        self.keep_alive.push(root.to_path_buf());
        self
    }

    /// Walk `library_root` and move every file that is not where the current
    /// convention puts it. Directories emptied by a real run's moves are removed
    /// afterwards, up to but not including the root.
    pub async fn run(&self, library_root: &Path) -> Result<RunReport> {
        let library_root = fs_utils::absolute_root(library_root)?;
        let scan = scanner::scan_directory(&library_root)?;

        let mut live: HashSet<IdentityKey> = scan.files.iter().map(identity::key_for).collect();
        let extra = self
            .keep_alive
            .iter()
            .map(|root| fs_utils::absolute_root(root))
            .collect::<std::io::Result<Vec<_>>>()?;
        let extra: Vec<&Path> = extra.iter().map(PathBuf::as_path).collect();
        live.extend(scanner::collect_keys(&extra)?);

        let mut report = self
            .pipeline
            .process(
                scan.files,
                &library_root,
                &library_root,
                live,
                self.grouper.as_deref(),
            )
            .await?;

        if !report.dry_run && report.count(PlanOutcome::Applied) > 0 {
            let emptied = report
                .plans
                .iter()
                .filter(|p| p.outcome == PlanOutcome::Applied)
                .flat_map(|p| {
                    std::iter::once(&p.source).chain(p.sidecars.iter().map(|s| &s.source))
                })
                .filter_map(|source| source.parent().map(Path::to_path_buf));
            report.pruned_dirs = fs_utils::prune_emptied_dirs(emptied, &library_root);
            tracing::info!("Removed {} empty directories", report.pruned_dirs);
        }

        tracing::info!(
            "Reorganized {:?}: {} moved, {} already in place, {} conflicts",
            library_root,
            report.count(PlanOutcome::Applied) + report.count(PlanOutcome::Pending),
            report.count(PlanOutcome::Skipped),
            report.count(PlanOutcome::Conflict)
        );

        Ok(report)
    }
}
