//! Path planning.
//!
//! Maps a resolved record to its canonical location in the library and builds
//! the [`MovePlan`] for a file, applying the conflict policy:
//!
//! - already at its canonical location: `skipped`
//! - destination occupied on disk, or claimed by an earlier plan in this run:
//!   `conflict` (never overwritten)
//! - otherwise: `pending`
//!
//! Canonical layout:
//!
//! ```text
//! Movies/[<Collection>/]<Title> (<Year>)/<Title> (<Year>).<ext>
//! TV Shows/[<Collection>/]<Show>/Season NN/<Show> - sNNeNN.<ext>
//! ```

use crate::models::media::{IdentityKey, MediaDetails, MetadataRecord, SourceFile};
use crate::models::plan::{MovePlan, PlanOutcome, SidecarMove};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const MOVIES_DIR: &str = "Movies";
pub const SHOWS_DIR: &str = "TV Shows";

/// Make a string safe to use as a single path component.
///
/// Strips `< > : " / \ | ? *` and control characters, collapses whitespace
/// and trailing dots. Falls back to `Unknown` when nothing is left.
pub fn sanitize_component(s: &str) -> String {
    let stripped: String = s
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .filter(|c| !c.is_control())
        .collect();

    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_end_matches('.').trim();

    if trimmed.is_empty() {
        "Unknown".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `<Title> (<Year>)`, or just `<Title>` without a year.
fn titled(title: &str, year: Option<u16>) -> String {
    match year {
        Some(year) => format!("{} ({})", title, year),
        None => title.to_string(),
    }
}

/// Canonical path of a record, relative to the library root.
pub fn canonical_path(record: &MetadataRecord, extension: &str) -> PathBuf {
    let title = sanitize_component(&record.title);
    let collection = record.collection.as_deref().map(sanitize_component);
    let ext = extension.trim_start_matches('.').to_lowercase();

    let mut path = PathBuf::new();
    match &record.details {
        MediaDetails::Movie => {
            let name = titled(&title, record.year);
            path.push(MOVIES_DIR);
            if let Some(collection) = collection {
                path.push(collection);
            }
            path.push(&name);
            path.push(with_extension(&name, &ext));
        }
        MediaDetails::Episode {
            season, episode, ..
        } => {
            path.push(SHOWS_DIR);
            if let Some(collection) = collection {
                path.push(collection);
            }
            path.push(&title);
            path.push(format!("Season {:02}", season));
            path.push(with_extension(
                &format!("{} - s{:02}e{:02}", title, season, episode),
                &ext,
            ));
        }
    }
    path
}

fn with_extension(stem: &str, ext: &str) -> String {
    if ext.is_empty() {
        stem.to_string()
    } else {
        format!("{}.{}", stem, ext)
    }
}

/// Destination of a sidecar: the primary's new stem plus whatever followed the
/// old stem (`Foo.2020.en.srt` -> `Foo (2020).en.srt`).
fn sidecar_destination(sidecar: &Path, source_stem: &str, destination: &Path) -> Option<PathBuf> {
    let name = sidecar.file_name()?.to_string_lossy();
    let suffix = name.strip_prefix(source_stem)?;
    let new_stem = destination.file_stem()?.to_string_lossy();
    Some(destination.with_file_name(format!("{}{}", new_stem, suffix)))
}

/// Builds move plans against one library root.
///
/// Destinations handed out as `pending` are remembered for the rest of the run,
/// so a second file resolving to the same place is a conflict in dry-run and
/// real runs alike.
pub struct PathPlanner {
    library_root: PathBuf,
    claimed: HashSet<PathBuf>,
}

impl PathPlanner {
    pub fn new(library_root: &Path) -> Self {
        Self {
            library_root: library_root.to_path_buf(),
            claimed: HashSet::new(),
        }
    }

    /// Absolute canonical destination of a record.
    pub fn destination_for(&self, record: &MetadataRecord, extension: &str) -> PathBuf {
        self.library_root.join(canonical_path(record, extension))
    }

    /// Plan the move of `file` to the canonical location of `record`.
    pub fn plan_move(
        &mut self,
        file: &SourceFile,
        key: &IdentityKey,
        record: &MetadataRecord,
    ) -> MovePlan {
        let destination = self.destination_for(record, &file.extension);

        let sidecars = file
            .sidecars
            .iter()
            .filter_map(|sidecar| {
                sidecar_destination(sidecar, file.stem(), &destination).map(|dest| SidecarMove {
                    source: sidecar.clone(),
                    destination: dest,
                })
            })
            .collect();

        let mut plan = MovePlan {
            source: file.path.clone(),
            destination,
            source_key: key.clone(),
            record: record.clone(),
            sidecars,
            outcome: PlanOutcome::Pending,
            note: None,
            failed_sidecars: Vec::new(),
        };

        if plan.destination == plan.source {
            plan.outcome = PlanOutcome::Skipped;
            plan.note = Some("already at canonical location".to_string());
        } else if self.claimed.contains(&plan.destination) {
            tracing::debug!(
                "Destination {:?} already claimed in this run",
                plan.destination
            );
            plan.outcome = PlanOutcome::Conflict;
            plan.note = Some("destination claimed by another file in this run".to_string());
        } else if plan.destination.exists() {
            plan.outcome = PlanOutcome::Conflict;
            plan.note = Some("destination occupied by a different file".to_string());
        } else {
            self.claimed.insert(plan.destination.clone());
        }

        plan
    }
}
