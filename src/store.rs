//! Resumable persistence store.
//!
//! Owns the run state and the two derived JSON artifacts. Both files are
//! rewritten in full, atomically (temp file then rename), after every single
//! recorded outcome, so an external reader never observes a torn state and a
//! killed run resumes from exactly what reached disk.

use crate::core::{AnalysisOutcome, Classification, DeletionStatus, LifecycleState};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Full categorized report; also the resume source.
pub const REPORT_FILE: &str = "obsolete_projects_report.json";
/// Deletion-ready subset consumed by `projsweep sweep`.
pub const DELETION_FILE: &str = "projects_for_deletion.json";

/// Locations of the two artifacts.
#[derive(Debug, Clone)]
pub struct StorePaths {
    pub report: PathBuf,
    pub deletion: PathBuf,
}

impl StorePaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            report: dir.join(REPORT_FILE),
            deletion: dir.join(DELETION_FILE),
        }
    }

    /// Paths for a sweep run driven by an explicit deletion-file location;
    /// the report artifact is expected alongside it.
    pub fn for_deletion_file(deletion: &Path) -> Self {
        let dir = match deletion.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self {
            report: dir.join(REPORT_FILE),
            deletion: deletion.to_path_buf(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportMetadata {
    pub generated_at: DateTime<Utc>,
    pub total_analyzed: usize,
    pub in_progress: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportSummary {
    pub obsolete: usize,
    pub potentially_obsolete: usize,
    pub active: usize,
}

/// Artifact A: every outcome, partitioned by classification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportArtifact {
    pub metadata: ReportMetadata,
    pub summary: ReportSummary,
    pub obsolete: Vec<AnalysisOutcome>,
    pub potentially_obsolete: Vec<AnalysisOutcome>,
    pub active: Vec<AnalysisOutcome>,
}

impl ReportArtifact {
    /// Mutable handle to the outcome for `project_id`, wherever it sits.
    pub fn find_mut(&mut self, project_id: &str) -> Option<&mut AnalysisOutcome> {
        self.obsolete
            .iter_mut()
            .chain(self.potentially_obsolete.iter_mut())
            .chain(self.active.iter_mut())
            .find(|o| o.project_id == project_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeletionMetadata {
    pub generated_at: DateTime<Utc>,
    pub generated_by: String,
    pub version: String,
    pub in_progress: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeletionSummary {
    pub total_safe_to_delete: usize,
    pub total_need_review: usize,
    pub total_candidates: usize,
}

/// One project in the deletion-ready artifact. Same shape as
/// [`AnalysisOutcome`] minus the classification field, with
/// `resource_counts` emptied: the full summary stays in the report artifact
/// only. This projection is deliberately lossy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeletionEntry {
    pub project_id: String,
    pub project_name: String,
    pub project_number: String,
    pub lifecycle_state: LifecycleState,
    pub total_resources: u64,
    pub last_activity: Option<DateTime<Utc>>,
    pub days_since_activity: Option<i64>,
    pub obsolete_reasons: Vec<String>,
    pub deletion_status: DeletionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub resource_counts: BTreeMap<String, u64>,
}

impl From<&AnalysisOutcome> for DeletionEntry {
    fn from(outcome: &AnalysisOutcome) -> Self {
        Self {
            project_id: outcome.project_id.clone(),
            project_name: outcome.project_name.clone(),
            project_number: outcome.project_number.clone(),
            lifecycle_state: outcome.lifecycle_state.clone(),
            total_resources: outcome.total_resources,
            last_activity: outcome.last_activity,
            days_since_activity: outcome.days_since_activity,
            obsolete_reasons: outcome.obsolete_reasons.clone(),
            deletion_status: outcome.deletion_status,
            deleted_at: outcome.deleted_at,
            resource_counts: BTreeMap::new(),
        }
    }
}

/// Artifact B: only deletion-relevant outcomes, partitioned by pipeline
/// status. `deleted` entries stay in `projects_to_delete` so a sweep re-run
/// can see them and stay idempotent; `skipped` and `pending` outcomes never
/// appear here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeletionArtifact {
    pub metadata: DeletionMetadata,
    pub summary: DeletionSummary,
    pub projects_to_delete: Vec<DeletionEntry>,
    pub projects_to_review: Vec<DeletionEntry>,
}

impl DeletionArtifact {
    pub fn find_mut(&mut self, project_id: &str) -> Option<&mut DeletionEntry> {
        self.projects_to_delete
            .iter_mut()
            .chain(self.projects_to_review.iter_mut())
            .find(|e| e.project_id == project_id)
    }
}

/// Write `value` as pretty-printed JSON via a temp file in the same
/// directory, then rename over the target. Readers only ever see the old or
/// the new complete file.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut tmp = NamedTempFile::new_in(&dir)
        .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
    serde_json::to_writer_pretty(tmp.as_file_mut(), value)
        .with_context(|| format!("failed to serialize {}", path.display()))?;
    tmp.as_file_mut().write_all(b"\n")?;
    tmp.persist(path)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}

/// Outcomes recorded so far, keyed by project id with insertion order kept
/// for artifact readability.
#[derive(Debug, Default)]
struct RunState {
    outcomes: Vec<AnalysisOutcome>,
    index: HashMap<String, usize>,
    in_progress: bool,
}

impl RunState {
    fn merge(&mut self, outcome: AnalysisOutcome) {
        match self.index.get(&outcome.project_id) {
            Some(&i) => self.outcomes[i] = outcome,
            None => {
                self.index.insert(outcome.project_id.clone(), self.outcomes.len());
                self.outcomes.push(outcome);
            }
        }
    }
}

/// Derive artifact A from the current outcomes.
pub fn report_from(
    outcomes: &[AnalysisOutcome],
    in_progress: bool,
    generated_at: DateTime<Utc>,
) -> ReportArtifact {
    let mut obsolete = Vec::new();
    let mut potentially_obsolete = Vec::new();
    let mut active = Vec::new();
    for outcome in outcomes {
        match outcome.classification {
            Classification::Obsolete => obsolete.push(outcome.clone()),
            Classification::PotentiallyObsolete => potentially_obsolete.push(outcome.clone()),
            Classification::Active => active.push(outcome.clone()),
        }
    }
    ReportArtifact {
        metadata: ReportMetadata {
            generated_at,
            total_analyzed: outcomes.len(),
            in_progress,
        },
        summary: ReportSummary {
            obsolete: obsolete.len(),
            potentially_obsolete: potentially_obsolete.len(),
            active: active.len(),
        },
        obsolete,
        potentially_obsolete,
        active,
    }
}

/// Derive artifact B from the current outcomes.
pub fn deletion_from(
    outcomes: &[AnalysisOutcome],
    in_progress: bool,
    generated_at: DateTime<Utc>,
) -> DeletionArtifact {
    let mut projects_to_delete = Vec::new();
    let mut projects_to_review = Vec::new();
    for outcome in outcomes {
        match outcome.deletion_status {
            DeletionStatus::SafeToDelete | DeletionStatus::Deleted => {
                projects_to_delete.push(DeletionEntry::from(outcome))
            }
            DeletionStatus::ReviewRequired => projects_to_review.push(DeletionEntry::from(outcome)),
            DeletionStatus::Pending | DeletionStatus::Skipped => {}
        }
    }
    DeletionArtifact {
        metadata: DeletionMetadata {
            generated_at,
            generated_by: "projsweep".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            in_progress,
        },
        summary: DeletionSummary {
            total_safe_to_delete: projects_to_delete.len(),
            total_need_review: projects_to_review.len(),
            total_candidates: projects_to_delete.len() + projects_to_review.len(),
        },
        projects_to_delete,
        projects_to_review,
    }
}

/// Single-writer store over the run state and its two artifacts.
///
/// All mutation goes through one mutex; `record` does read-merge-write under
/// it, which is what serializes outcome submission across the worker pool.
#[derive(Debug)]
pub struct Store {
    paths: StorePaths,
    state: Mutex<RunState>,
}

impl Store {
    /// Open the store. With `fresh`, discard both artifacts and start empty;
    /// otherwise rebuild the run state from the report artifact if present.
    pub fn load(paths: StorePaths, fresh: bool) -> Result<Self> {
        let mut state = RunState {
            in_progress: true,
            ..Default::default()
        };

        if fresh {
            remove_if_exists(&paths.report)?;
            remove_if_exists(&paths.deletion)?;
            log::info!("cleared previous artifacts, starting fresh");
        } else if paths.report.exists() {
            match read_report(&paths.report) {
                Ok(report) => {
                    for outcome in report
                        .obsolete
                        .into_iter()
                        .chain(report.potentially_obsolete)
                        .chain(report.active)
                    {
                        state.merge(outcome);
                    }
                    if !state.outcomes.is_empty() {
                        log::info!(
                            "resumed progress: {} projects already analyzed",
                            state.outcomes.len()
                        );
                    }
                }
                Err(e) => {
                    log::warn!(
                        "could not load previous progress from {}: {e:#}; starting empty",
                        paths.report.display()
                    );
                }
            }
        }

        Ok(Self {
            paths,
            state: Mutex::new(state),
        })
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    /// Project ids already present, terminal or not; the orchestrator's
    /// worklist is the lister output minus this set.
    pub fn known_ids(&self) -> HashSet<String> {
        self.state.lock().index.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<AnalysisOutcome> {
        self.state.lock().outcomes.clone()
    }

    /// Merge one outcome and immediately rewrite both artifacts. Any write
    /// failure is fatal: the caller must not treat the outcome as recorded.
    pub fn record(&self, outcome: AnalysisOutcome) -> Result<()> {
        let mut state = self.state.lock();
        state.merge(outcome);
        self.write_artifacts(&state)
    }

    /// Mark the run complete and perform the final write.
    pub fn finalize(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.in_progress = false;
        self.write_artifacts(&state)
    }

    fn write_artifacts(&self, state: &RunState) -> Result<()> {
        let now = Utc::now();
        write_json_atomic(
            &self.paths.report,
            &report_from(&state.outcomes, state.in_progress, now),
        )?;
        write_json_atomic(
            &self.paths.deletion,
            &deletion_from(&state.outcomes, state.in_progress, now),
        )?;
        Ok(())
    }
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("failed to remove {}", path.display())),
    }
}

pub fn read_report(path: &Path) -> Result<ReportArtifact> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

pub fn read_deletion(path: &Path) -> Result<DeletionArtifact> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ActivityVerdict, ProjectRecord, ResourceSummary};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn project(id: &str) -> ProjectRecord {
        ProjectRecord {
            project_id: id.to_string(),
            project_name: format!("Project {id}"),
            project_number: "42".to_string(),
            lifecycle_state: LifecycleState::Active,
        }
    }

    fn outcome(id: &str, classification: Classification) -> AnalysisOutcome {
        let reasons = match classification {
            Classification::Active => vec![],
            _ => vec!["No resources found".to_string()],
        };
        AnalysisOutcome::classified(
            &project(id),
            ResourceSummary {
                buckets: 3,
                ..Default::default()
            },
            ActivityVerdict {
                last_activity: None,
                days_since_activity: None,
                classification,
                obsolete_reasons: reasons,
            },
        )
    }

    #[test]
    fn record_partitions_outcomes_and_counts_stay_consistent() {
        let dir = TempDir::new().unwrap();
        let store = Store::load(StorePaths::in_dir(dir.path()), false).unwrap();

        store.record(outcome("a", Classification::Obsolete)).unwrap();
        store
            .record(outcome("b", Classification::PotentiallyObsolete))
            .unwrap();
        store.record(outcome("c", Classification::Active)).unwrap();

        let report = read_report(&store.paths().report).unwrap();
        assert_eq!(report.metadata.total_analyzed, 3);
        assert!(report.metadata.in_progress);
        assert_eq!(report.summary.obsolete, 1);
        assert_eq!(report.summary.potentially_obsolete, 1);
        assert_eq!(report.summary.active, 1);
        // Partition completeness: sizes sum to the total.
        assert_eq!(
            report.obsolete.len() + report.potentially_obsolete.len() + report.active.len(),
            report.metadata.total_analyzed
        );
    }

    #[test]
    fn record_replaces_on_same_key() {
        let dir = TempDir::new().unwrap();
        let store = Store::load(StorePaths::in_dir(dir.path()), false).unwrap();

        store.record(outcome("a", Classification::Active)).unwrap();
        store.record(outcome("a", Classification::Obsolete)).unwrap();

        assert_eq!(store.len(), 1);
        let report = read_report(&store.paths().report).unwrap();
        assert_eq!(report.summary.obsolete, 1);
        assert_eq!(report.summary.active, 0);
    }

    #[test]
    fn finalize_clears_in_progress() {
        let dir = TempDir::new().unwrap();
        let store = Store::load(StorePaths::in_dir(dir.path()), false).unwrap();
        store.record(outcome("a", Classification::Obsolete)).unwrap();
        store.finalize().unwrap();

        let report = read_report(&store.paths().report).unwrap();
        assert!(!report.metadata.in_progress);
        let deletion = read_deletion(&store.paths().deletion).unwrap();
        assert!(!deletion.metadata.in_progress);
    }

    #[test]
    fn reload_reconstructs_the_same_state() {
        let dir = TempDir::new().unwrap();
        let paths = StorePaths::in_dir(dir.path());
        let store = Store::load(paths.clone(), false).unwrap();
        store.record(outcome("a", Classification::Obsolete)).unwrap();
        store.record(outcome("b", Classification::Active)).unwrap();
        store.finalize().unwrap();
        let before = store.snapshot();
        drop(store);

        let reloaded = Store::load(paths, false).unwrap();
        let mut after = reloaded.snapshot();
        // Reload order follows the report partitions; compare as sets.
        after.sort_by(|x, y| x.project_id.cmp(&y.project_id));
        let mut before = before;
        before.sort_by(|x, y| x.project_id.cmp(&y.project_id));
        assert_eq!(after, before);
        assert_eq!(
            reloaded.known_ids(),
            ["a", "b"].iter().map(|s| s.to_string()).collect()
        );
    }

    #[test]
    fn fresh_start_discards_artifacts() {
        let dir = TempDir::new().unwrap();
        let paths = StorePaths::in_dir(dir.path());
        let store = Store::load(paths.clone(), false).unwrap();
        store.record(outcome("a", Classification::Obsolete)).unwrap();
        drop(store);

        let store = Store::load(paths.clone(), true).unwrap();
        assert!(store.is_empty());
        assert!(!paths.report.exists());
    }

    #[test]
    fn corrupt_report_degrades_to_empty_state() {
        let dir = TempDir::new().unwrap();
        let paths = StorePaths::in_dir(dir.path());
        fs::write(&paths.report, "{ not json").unwrap();

        let store = Store::load(paths, false).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn deletion_artifact_membership_and_stripped_counts() {
        let dir = TempDir::new().unwrap();
        let store = Store::load(StorePaths::in_dir(dir.path()), false).unwrap();

        store.record(outcome("del", Classification::Obsolete)).unwrap();
        store
            .record(outcome("rev", Classification::PotentiallyObsolete))
            .unwrap();
        store.record(outcome("act", Classification::Active)).unwrap();
        store
            .record(AnalysisOutcome::skipped(
                &project("skip"),
                Classification::PotentiallyObsolete,
                "Scan skipped: quota exceeded",
            ))
            .unwrap();

        let deletion = read_deletion(&store.paths().deletion).unwrap();
        assert_eq!(deletion.summary.total_safe_to_delete, 1);
        assert_eq!(deletion.summary.total_need_review, 1);
        assert_eq!(deletion.summary.total_candidates, 2);
        assert_eq!(deletion.projects_to_delete[0].project_id, "del");
        assert_eq!(deletion.projects_to_review[0].project_id, "rev");
        // Pending and skipped outcomes never reach the deletion file.
        assert!(find_entry(&deletion, "act").is_none());
        assert!(find_entry(&deletion, "skip").is_none());
        // Lossy projection: counts live only in the report artifact.
        assert!(deletion.projects_to_delete[0].resource_counts.is_empty());
        assert_eq!(deletion.projects_to_delete[0].total_resources, 3);
    }

    #[test]
    fn deleted_entries_stay_in_the_deletion_file() {
        let mut done = outcome("gone", Classification::Obsolete);
        done.deletion_status = DeletionStatus::Deleted;
        done.deleted_at = Some(Utc::now());

        let artifact = deletion_from(&[done], false, Utc::now());
        assert_eq!(artifact.projects_to_delete.len(), 1);
        assert_eq!(
            artifact.projects_to_delete[0].deletion_status,
            DeletionStatus::Deleted
        );
    }

    fn find_entry<'a>(artifact: &'a DeletionArtifact, id: &str) -> Option<&'a DeletionEntry> {
        artifact
            .projects_to_delete
            .iter()
            .chain(artifact.projects_to_review.iter())
            .find(|e| e.project_id == id)
    }
}
