//! Deletion workflow: confirm-then-delete over the deletion-ready artifact.
//!
//! A small state machine per invocation: Loaded -> Confirming -> Executing
//! -> Done, with Aborted reachable from Confirming and Failed from
//! Executing. Dry-run is the default; execution requires the literal
//! confirmation phrase. Every successful deletion is flushed to disk before
//! the next candidate is attempted, mirroring the scan store's durability
//! discipline, and the matching entry in the report artifact is patched so
//! the two views never disagree.

use crate::cloud::ProjectDeleter;
use crate::core::DeletionStatus;
use crate::store::{read_deletion, read_report, write_json_atomic, StorePaths};
use anyhow::{Context, Result};
use chrono::Utc;
use indicatif::ProgressBar;

/// The operator must type exactly this to unlock execution.
pub const CONFIRM_PHRASE: &str = "DELETE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepState {
    Loaded,
    Confirming,
    Executing,
    Done,
    Aborted,
    Failed,
}

#[derive(Debug, Clone, Default)]
pub struct SweepOptions {
    /// Actually delete. Off means dry-run: report and touch nothing.
    pub execute: bool,
    /// Also sweep the review tier, not just the safe-to-delete set.
    pub include_review: bool,
}

/// What a sweep invocation did (or would do, for a dry run).
#[derive(Debug, Clone)]
pub struct SweepReport {
    pub state: SweepState,
    /// Candidates after filtering out already-deleted entries.
    pub candidates: Vec<String>,
    pub deleted: Vec<String>,
    /// Per-project failures: (project_id, error). Non-fatal to the batch.
    pub failed: Vec<(String, String)>,
    /// Entries skipped because a previous run already deleted them.
    pub already_deleted: usize,
    /// Set when the run died in Executing on a persistence error.
    pub failure: Option<String>,
}

impl SweepReport {
    fn new(state: SweepState, candidates: Vec<String>, already_deleted: usize) -> Self {
        Self {
            state,
            candidates,
            deleted: Vec::new(),
            failed: Vec::new(),
            already_deleted,
            failure: None,
        }
    }
}

/// Drive the sweep state machine over the artifact at `paths.deletion`.
///
/// `confirm` supplies the operator's confirmation line; it is only invoked
/// when execution was requested and there are candidates. `progress` ticks
/// once per attempted deletion; dry runs never touch it.
pub fn run_sweep<D: ProjectDeleter>(
    paths: &StorePaths,
    opts: &SweepOptions,
    deleter: &D,
    confirm: &mut dyn FnMut() -> Result<String>,
    progress: &ProgressBar,
) -> Result<SweepReport> {
    // Loaded
    let mut artifact = read_deletion(&paths.deletion).with_context(|| {
        format!(
            "no deletion-ready artifact at {}; run `projsweep scan` first",
            paths.deletion.display()
        )
    })?;

    let mut candidates: Vec<String> = Vec::new();
    let mut already_deleted = 0;
    {
        let review: &[_] = if opts.include_review {
            &artifact.projects_to_review
        } else {
            &[]
        };
        for entry in artifact.projects_to_delete.iter().chain(review) {
            if entry.deletion_status == DeletionStatus::Deleted {
                already_deleted += 1;
            } else {
                candidates.push(entry.project_id.clone());
            }
        }
    }
    log::info!(
        "loaded {}: {} candidate(s), {} already deleted",
        paths.deletion.display(),
        candidates.len(),
        already_deleted
    );

    if !opts.execute || candidates.is_empty() {
        return Ok(SweepReport::new(SweepState::Done, candidates, already_deleted));
    }

    // Confirming
    let answer = confirm().context("failed to read confirmation")?;
    if answer.trim() != CONFIRM_PHRASE {
        log::warn!("confirmation phrase not matched, aborting sweep");
        return Ok(SweepReport::new(
            SweepState::Aborted,
            candidates,
            already_deleted,
        ));
    }

    // Executing
    let mut report_artifact = if paths.report.exists() {
        match read_report(&paths.report) {
            Ok(report) => Some(report),
            Err(e) => {
                log::warn!("report artifact unreadable, patching deletion file only: {e:#}");
                None
            }
        }
    } else {
        None
    };

    let mut result = SweepReport::new(SweepState::Executing, candidates.clone(), already_deleted);
    progress.set_length(candidates.len() as u64);
    for id in &candidates {
        match deleter.delete_project(id) {
            Ok(()) => {
                let now = Utc::now();
                if let Some(entry) = artifact.find_mut(id) {
                    entry.deletion_status = DeletionStatus::Deleted;
                    entry.deleted_at = Some(now);
                }
                artifact.metadata.generated_at = now;
                if let Err(e) = write_json_atomic(&paths.deletion, &artifact) {
                    result.state = SweepState::Failed;
                    result.failure = Some(format!("{e:#}"));
                    return Ok(result);
                }
                if let Some(report) = report_artifact.as_mut() {
                    if let Some(outcome) = report.find_mut(id) {
                        outcome.deletion_status = DeletionStatus::Deleted;
                        outcome.deleted_at = Some(now);
                    }
                    report.metadata.generated_at = now;
                    if let Err(e) = write_json_atomic(&paths.report, report) {
                        result.state = SweepState::Failed;
                        result.failure = Some(format!("{e:#}"));
                        return Ok(result);
                    }
                }
                log::info!("deleted {id}");
                result.deleted.push(id.clone());
            }
            Err(e) => {
                // Status stays untouched so the next invocation retries it.
                log::warn!("failed to delete {id}: {e}");
                result.failed.push((id.clone(), e.to_string()));
            }
        }
        progress.inc(1);
    }

    result.state = SweepState::Done;
    Ok(result)
}
