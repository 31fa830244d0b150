//! Move executor.
//!
//! Applies one [`MovePlan`] at a time. Each primary move is atomic on its own
//! (rename, or verified copy + delete across filesystems); sidecars move one by
//! one and a failed sidecar never rolls the primary back.

use crate::core::identity;
use crate::models::plan::{MovePlan, PlanOutcome};
use crate::utils::fs as fs_utils;
use crate::{Error, Result};

/// Executor configuration.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Whether to verify checksums after cross-filesystem copies.
    pub verify_checksum: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            verify_checksum: true,
        }
    }
}

/// Plan executor.
#[derive(Debug, Default)]
pub struct Executor {
    config: ExecutorConfig,
}

impl Executor {
    /// Create a new executor with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new executor with custom configuration.
    pub fn with_config(config: ExecutorConfig) -> Self {
        Self { config }
    }

    /// Execute a plan.
    ///
    /// Only `pending` plans do anything. The filesystem is re-checked first:
    /// a source already sitting at its destination is `skipped`, and a
    /// destination that appeared since planning is a `conflict`. In dry-run
    /// the plan comes back `pending` with nothing touched.
    ///
    /// Returns `MoveIo` when the primary file cannot be moved.
    pub fn execute(&self, mut plan: MovePlan, dry_run: bool) -> Result<MovePlan> {
        if plan.outcome != PlanOutcome::Pending {
            return Ok(plan);
        }

        if !plan.source.exists() {
            let already_moved = identity::key_for_path(&plan.destination)
                .is_some_and(|occupant| occupant.same_content(&plan.source_key));
            if already_moved {
                plan.outcome = PlanOutcome::Skipped;
                plan.note = Some("already moved".to_string());
                return Ok(plan);
            }
            return Err(Error::move_io(
                &plan.source,
                std::io::Error::new(std::io::ErrorKind::NotFound, "source vanished"),
            ));
        }

        if plan.destination.exists() {
            plan.outcome = PlanOutcome::Conflict;
            plan.note = Some("destination occupied by a different file".to_string());
            return Ok(plan);
        }

        if dry_run {
            tracing::debug!(
                "[dry-run] Would move {:?} -> {:?}",
                plan.source,
                plan.destination
            );
            return Ok(plan);
        }

        fs_utils::move_file(&plan.source, &plan.destination, self.config.verify_checksum)
            .map_err(|e| Error::move_io(&plan.source, e))?;
        tracing::info!("Moved {:?} -> {:?}", plan.source, plan.destination);

        for sidecar in &plan.sidecars {
            if sidecar.destination.exists() {
                tracing::warn!(
                    "Sidecar destination {:?} already exists, leaving {:?} in place",
                    sidecar.destination,
                    sidecar.source
                );
                plan.failed_sidecars.push(sidecar.source.clone());
                continue;
            }
            match fs_utils::move_file(&sidecar.source, &sidecar.destination, self.config.verify_checksum) {
                Ok(()) => tracing::debug!("Moved sidecar {:?}", sidecar.destination),
                Err(e) => {
                    tracing::warn!("Failed to move sidecar {:?}: {}", sidecar.source, e);
                    plan.failed_sidecars.push(sidecar.source.clone());
                }
            }
        }

        plan.outcome = PlanOutcome::Applied;
        Ok(plan)
    }
}
