//! The resolution pipeline.
//!
//! scan -> identity -> cache lookup -> classify -> resolve -> cache store ->
//! plan -> execute -> re-key -> purge
//!
//! Resolution runs concurrently up to `concurrency` files at a time; the cache
//! sits behind a read/write lock so lookups share and stores serialize.
//! Planning and moves run sequentially in source-path order, and stale cache
//! entries are purged once every file has been resolved or skipped.

use crate::core::cache::{CacheEntry, MetadataCache};
use crate::core::classifier::Classifier;
use crate::core::executor::Executor;
use crate::core::grouper::{self, Grouper};
use crate::core::identity;
use crate::core::planner::PathPlanner;
use crate::core::resolver::{MetadataResolver, MetadataService};
use crate::core::scanner;
use crate::models::media::{IdentityKey, MediaKind, MetadataRecord, SourceFile};
use crate::models::plan::{FileFailure, PlanOutcome, RunReport};
use crate::{Error, Result};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use crate::utils::fs as fs_utils;
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Per-run switches.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Plan and report without touching the media trees.
    pub dry_run: bool,
    /// Ignore cached records and overwrite them with fresh resolutions.
    pub bypass_cache: bool,
    /// Maximum files resolved at once.
    pub concurrency: usize,
    /// Draw a progress bar while resolving.
    pub show_progress: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            bypass_cache: false,
            concurrency: 3,
            show_progress: false,
        }
    }
}

/// Where a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Cache,
    Services,
}

/// Outcome of resolving one file.
struct Resolution {
    file: SourceFile,
    key: IdentityKey,
    result: Result<(MetadataRecord, Source)>,
}

/// Organize/reorganize engine over one cache.
pub struct Pipeline<C: MetadataCache> {
    classifier: Arc<dyn Classifier>,
    resolver: MetadataResolver,
    cache: Arc<RwLock<C>>,
    executor: Executor,
    options: PipelineOptions,
}

impl<C: MetadataCache> Pipeline<C> {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        service: Arc<dyn MetadataService>,
        cache: C,
        options: PipelineOptions,
    ) -> Self {
        Self {
            classifier,
            resolver: MetadataResolver::new(service),
            cache: Arc::new(RwLock::new(cache)),
            executor: Executor::new(),
            options,
        }
    }

    /// Move everything in `source_root` into its canonical place under
    /// `library_root`.
    ///
    /// Fails only when `source_root` cannot be scanned; every per-file problem
    /// ends up in the report instead.
    pub async fn organize(&self, source_root: &Path, library_root: &Path) -> Result<RunReport> {
        let source_root = fs_utils::absolute_root(source_root)?;
        let library_root = fs_utils::absolute_root(library_root)?;
        let scan = scanner::scan_directory(&source_root)?;

        let mut live: HashSet<IdentityKey> = scan.files.iter().map(identity::key_for).collect();
        live.extend(scanner::collect_keys(&[library_root.as_path()])?);

        self.process(scan.files, &source_root, &library_root, live, None)
            .await
    }

    /// Resolve, plan and move `files`, then purge the cache against `live`.
    ///
    /// `live` must hold the identity keys of every file currently present in
    /// the scanned trees; keys of moved files are swapped for their new ones
    /// before the purge. `scan_root` is used to give the classifier each
    /// file's folder context. Both roots are expected in absolute form, see
    /// [`fs_utils::absolute_root`]. With a `grouper`, records that have no
    /// collection get one suggested before planning.
    pub async fn process(
        &self,
        files: Vec<SourceFile>,
        scan_root: &Path,
        library_root: &Path,
        mut live: HashSet<IdentityKey>,
        grouper: Option<&dyn Grouper>,
    ) -> Result<RunReport> {
        let mut report = RunReport {
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at: chrono::Utc::now().to_rfc3339(),
            dry_run: self.options.dry_run,
            scanned: files.len(),
            ..Default::default()
        };

        let mut resolutions = self.resolve_all(files, scan_root).await;
        resolutions.sort_by(|a, b| a.file.path.cmp(&b.file.path));
        if let Some(grouper) = grouper {
            report.grouped = self.assign_collections(grouper, &mut resolutions).await;
        }

        let mut planner = PathPlanner::new(library_root);
        for resolution in resolutions {
            let (record, source) = match resolution.result {
                Ok(resolved) => resolved,
                Err(e) => {
                    tracing::warn!(
                        "Skipping {:?} [{}]: {}",
                        resolution.file.path,
                        e.stage(),
                        e
                    );
                    report.failures.push(FileFailure {
                        path: resolution.file.path,
                        stage: e.stage(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            match source {
                Source::Cache => report.cache_hits += 1,
                Source::Services => report.resolved += 1,
            }

            let plan = planner.plan_move(&resolution.file, &resolution.key, &record);
            if plan.outcome == PlanOutcome::Conflict {
                let err = Error::PlanConflict(format!(
                    "{} ({})",
                    plan.destination.display(),
                    plan.note.as_deref().unwrap_or("occupied")
                ));
                tracing::warn!("Leaving {:?} in place [{}]: {}", plan.source, err.stage(), err);
            }

            let source_path = plan.source.clone();
            match self.executor.execute(plan, self.options.dry_run) {
                Ok(plan) => {
                    if plan.outcome == PlanOutcome::Applied {
                        live.remove(&plan.source_key);
                        if let Some(new_key) = identity::key_for_path(&plan.destination) {
                            live.insert(new_key.clone());
                            self.store(new_key, plan.record.clone(), true).await;
                        }
                    }
                    report.plans.push(plan);
                }
                Err(e) => {
                    tracing::warn!("Skipping {:?} [{}]: {}", source_path, e.stage(), e);
                    report.failures.push(FileFailure {
                        path: source_path,
                        stage: e.stage(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        match self.cache.write().await.purge_stale(&live) {
            Ok(purged) => report.purged = purged,
            Err(e) => tracing::warn!("Failed to purge stale cache entries: {}", e),
        }

        tracing::info!(
            "Run {}: {} scanned, {} from cache, {} resolved, {} grouped, {} failed, {} purged",
            report.run_id,
            report.scanned,
            report.cache_hits,
            report.resolved,
            report.grouped,
            report.failures.len(),
            report.purged
        );

        Ok(report)
    }

    /// Resolve every file, at most `concurrency` at a time.
    async fn resolve_all(&self, files: Vec<SourceFile>, scan_root: &Path) -> Vec<Resolution> {
        let pb = if self.options.show_progress {
            ProgressBar::new(files.len() as u64)
        } else {
            ProgressBar::hidden()
        };
        if let Ok(style) =
            ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("=>-"));
        }

        let resolutions = stream::iter(files)
            .map(|file| {
                let pb = pb.clone();
                async move {
                    let key = identity::key_for(&file);
                    let context = folder_context(&file, scan_root);
                    let result = self.resolve_one(&file, &key, context.as_deref()).await;
                    pb.set_message(file.filename.clone());
                    pb.inc(1);
                    Resolution { file, key, result }
                }
            })
            .buffer_unordered(self.options.concurrency.max(1))
            .collect::<Vec<_>>()
            .await;

        pb.finish_and_clear();
        resolutions
    }

    /// Give records without a collection the one the grouper suggests, and
    /// store the change under the file's current key. Returns how many records
    /// were grouped.
    async fn assign_collections(
        &self,
        grouper: &dyn Grouper,
        resolutions: &mut [Resolution],
    ) -> usize {
        let mut grouped = 0;

        for kind in [MediaKind::Movie, MediaKind::Episode] {
            let titles: Vec<String> = resolutions
                .iter()
                .filter_map(|r| r.result.as_ref().ok())
                .filter(|(record, _)| record.kind() == kind && record.collection.is_none())
                .map(|(record, _)| record.title.clone())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            if titles.is_empty() {
                continue;
            }

            let suggestions = grouper::suggest_collections(grouper, kind, &titles).await;
            if suggestions.is_empty() {
                continue;
            }

            for resolution in resolutions.iter_mut() {
                let Ok((record, _)) = resolution.result.as_mut() else {
                    continue;
                };
                if record.kind() != kind || record.collection.is_some() {
                    continue;
                }
                let Some(collection) = grouper::lookup_collection(&suggestions, &record.title)
                else {
                    continue;
                };
                *record = record.clone().with_collection(Some(collection.to_string()));
                if record.collection.is_some() {
                    grouped += 1;
                    self.store(resolution.key.clone(), record.clone(), true).await;
                }
            }
        }

        if grouped > 0 {
            tracing::info!("Grouped {} files into suggested collections", grouped);
        }
        grouped
    }

    async fn resolve_one(
        &self,
        file: &SourceFile,
        key: &IdentityKey,
        context: Option<&str>,
    ) -> Result<(MetadataRecord, Source)> {
        if !self.options.bypass_cache {
            if let Some(record) = self.cache.read().await.lookup(key) {
                tracing::debug!("Cache hit for {:?}", file.path);
                return Ok((record, Source::Cache));
            }
        }

        let guess = self.classifier.classify(&file.filename, context).await?;
        tracing::debug!("Guess for {}: {:?}", file.filename, guess);
        let record = self.resolver.resolve(&guess).await?;

        self.store(key.clone(), record.clone(), self.options.bypass_cache)
            .await;
        Ok((record, Source::Services))
    }

    /// Write-through store; a failed write costs a future cache hit, not the file.
    async fn store(&self, key: IdentityKey, record: MetadataRecord, refresh: bool) {
        let path = key.path.clone();
        if let Err(e) = self
            .cache
            .write()
            .await
            .store(CacheEntry::new(key, record), refresh)
        {
            tracing::warn!("Failed to cache {:?} [{}]: {}", path, e.stage(), e);
        }
    }
}

/// Directory of `file` relative to the scan root, e.g. `Bar/Season 1`.
fn folder_context(file: &SourceFile, scan_root: &Path) -> Option<String> {
    let relative = file.parent_dir.strip_prefix(scan_root).ok()?;
    let context = relative.to_string_lossy().to_string();
    if context.is_empty() {
        None
    } else {
        Some(context)
    }
}
