//! Move plan and run report models.

use super::media::{IdentityKey, MetadataRecord};
use crate::error::Stage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Outcome of a move plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanOutcome {
    /// Ready to move (or, in dry-run, would be moved).
    Pending,
    /// Moved.
    Applied,
    /// Already at its canonical location.
    Skipped,
    /// Destination occupied by a different file.
    Conflict,
}

impl std::fmt::Display for PlanOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanOutcome::Pending => write!(f, "pending"),
            PlanOutcome::Applied => write!(f, "applied"),
            PlanOutcome::Skipped => write!(f, "skipped"),
            PlanOutcome::Conflict => write!(f, "conflict"),
        }
    }
}

/// A sidecar file travelling with its primary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidecarMove {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// A proposed move of one primary file and its sidecars.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovePlan {
    /// Current location.
    pub source: PathBuf,
    /// Canonical location.
    pub destination: PathBuf,
    /// Identity of the source at planning time.
    pub source_key: IdentityKey,
    /// Record the destination was derived from.
    pub record: MetadataRecord,
    /// Sidecar moves.
    pub sidecars: Vec<SidecarMove>,
    /// Plan status.
    pub outcome: PlanOutcome,
    /// Why the plan was skipped or conflicted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Sidecars that failed to move.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_sidecars: Vec<PathBuf>,
}

/// A file that was left in place because a stage failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileFailure {
    /// Source path.
    pub path: PathBuf,
    /// Stage that failed.
    pub stage: Stage,
    /// Underlying cause.
    pub reason: String,
}

/// Summary of one organize or reorganize run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    /// Run identifier.
    pub run_id: String,
    /// Start timestamp.
    pub started_at: String,
    /// Whether the run was a preview.
    pub dry_run: bool,
    /// Primary files enumerated.
    pub scanned: usize,
    /// Files resolved from the cache.
    pub cache_hits: usize,
    /// Files resolved through the external services.
    pub resolved: usize,
    /// Files given a collection by the grouper.
    pub grouped: usize,
    /// One plan per resolved file, sorted by source path.
    pub plans: Vec<MovePlan>,
    /// Files skipped because of an error.
    pub failures: Vec<FileFailure>,
    /// Stale cache entries removed.
    pub purged: usize,
    /// Empty directories removed after moves.
    pub pruned_dirs: usize,
}

impl RunReport {
    /// Number of plans with the given outcome.
    pub fn count(&self, outcome: PlanOutcome) -> usize {
        self.plans.iter().filter(|p| p.outcome == outcome).count()
    }

    /// Plans that would move or did move a file.
    pub fn moves(&self) -> impl Iterator<Item = &MovePlan> {
        self.plans
            .iter()
            .filter(|p| matches!(p.outcome, PlanOutcome::Pending | PlanOutcome::Applied))
    }
}
