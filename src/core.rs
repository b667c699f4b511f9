//! Core data model shared by the scan and sweep workflows.
//!
//! Everything that ends up in the on-disk artifacts lives here. Field order
//! on the serde structs is load-bearing: artifacts are rewritten in full on
//! every record, and stable field order is what makes back-to-back scans
//! byte-comparable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Project lifecycle state as reported by the cloud provider.
///
/// Serialized as the raw upstream string (`ACTIVE`, `DELETE_REQUESTED`, or
/// whatever else the provider invents), so unknown states round-trip
/// untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LifecycleState {
    Active,
    DeleteRequested,
    Other(String),
}

impl LifecycleState {
    pub fn is_active(&self) -> bool {
        matches!(self, LifecycleState::Active)
    }
}

impl From<String> for LifecycleState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "ACTIVE" => LifecycleState::Active,
            "DELETE_REQUESTED" => LifecycleState::DeleteRequested,
            _ => LifecycleState::Other(s),
        }
    }
}

impl From<LifecycleState> for String {
    fn from(state: LifecycleState) -> String {
        state.to_string()
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Active => f.write_str("ACTIVE"),
            LifecycleState::DeleteRequested => f.write_str("DELETE_REQUESTED"),
            LifecycleState::Other(s) => f.write_str(s),
        }
    }
}

/// Identity of a candidate project as returned by the lister.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub project_id: String,
    pub project_name: String,
    pub project_number: String,
    pub lifecycle_state: LifecycleState,
}

/// One resource record from the inventory collaborator.
///
/// `update_time` is preferred over `create_time` when deriving activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub asset_type: String,
    pub update_time: Option<DateTime<Utc>>,
    pub create_time: Option<DateTime<Utc>>,
}

impl ResourceRecord {
    pub fn new(asset_type: impl Into<String>) -> Self {
        Self {
            asset_type: asset_type.into(),
            update_time: None,
            create_time: None,
        }
    }

    /// The timestamp that counts as this resource's last activity.
    pub fn activity_time(&self) -> Option<DateTime<Utc>> {
        self.update_time.or(self.create_time)
    }
}

/// Per-category resource counts. Never stores individual resources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSummary {
    #[serde(default)]
    pub instances: u64,
    #[serde(default)]
    pub disks: u64,
    #[serde(default)]
    pub snapshots: u64,
    #[serde(default)]
    pub images: u64,
    #[serde(default)]
    pub buckets: u64,
    #[serde(default)]
    pub sql_instances: u64,
    #[serde(default)]
    pub app_engines: u64,
    #[serde(default)]
    pub cloud_functions: u64,
    #[serde(default)]
    pub other: u64,
}

impl ResourceSummary {
    pub fn total(&self) -> u64 {
        self.instances
            + self.disks
            + self.snapshots
            + self.images
            + self.buckets
            + self.sql_instances
            + self.app_engines
            + self.cloud_functions
            + self.other
    }
}

/// Obsolescence classification for a scanned project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Obsolete,
    PotentiallyObsolete,
    Active,
}

/// Where a project sits in the deletion pipeline.
///
/// Everything except `Pending` is terminal: a terminal outcome is never
/// re-analyzed by a later scan run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionStatus {
    Pending,
    SafeToDelete,
    ReviewRequired,
    Deleted,
    Skipped,
}

impl DeletionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DeletionStatus::Pending)
    }
}

/// Activity verdict produced by the classifier.
///
/// Invariant: `obsolete_reasons` is empty iff `classification` is `Active`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityVerdict {
    pub last_activity: Option<DateTime<Utc>>,
    pub days_since_activity: Option<i64>,
    pub classification: Classification,
    pub obsolete_reasons: Vec<String>,
}

/// The unit of persistence: one project's identity, resource summary,
/// verdict, and deletion pipeline state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub project_id: String,
    pub project_name: String,
    pub project_number: String,
    pub lifecycle_state: LifecycleState,
    pub total_resources: u64,
    pub resource_counts: ResourceSummary,
    pub last_activity: Option<DateTime<Utc>>,
    pub days_since_activity: Option<i64>,
    pub classification: Classification,
    pub obsolete_reasons: Vec<String>,
    pub deletion_status: DeletionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl AnalysisOutcome {
    /// Outcome for a project the classifier actually saw.
    pub fn classified(
        project: &ProjectRecord,
        counts: ResourceSummary,
        verdict: ActivityVerdict,
    ) -> Self {
        let deletion_status = match verdict.classification {
            Classification::Obsolete => DeletionStatus::SafeToDelete,
            Classification::PotentiallyObsolete => DeletionStatus::ReviewRequired,
            Classification::Active => DeletionStatus::Pending,
        };
        Self {
            project_id: project.project_id.clone(),
            project_name: project.project_name.clone(),
            project_number: project.project_number.clone(),
            lifecycle_state: project.lifecycle_state.clone(),
            total_resources: counts.total(),
            resource_counts: counts,
            last_activity: verdict.last_activity,
            days_since_activity: verdict.days_since_activity,
            classification: verdict.classification,
            obsolete_reasons: verdict.obsolete_reasons,
            deletion_status,
            deleted_at: None,
        }
    }

    /// Terminal outcome for a project whose scan was skipped (quota, retry
    /// exhaustion, or the project vanishing between listing and scanning).
    pub fn skipped(
        project: &ProjectRecord,
        classification: Classification,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project.project_id.clone(),
            project_name: project.project_name.clone(),
            project_number: project.project_number.clone(),
            lifecycle_state: project.lifecycle_state.clone(),
            total_resources: 0,
            resource_counts: ResourceSummary::default(),
            last_activity: None,
            days_since_activity: None,
            classification,
            obsolete_reasons: vec![reason.into()],
            deletion_status: DeletionStatus::Skipped,
            deleted_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.deletion_status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn project(state: &str) -> ProjectRecord {
        ProjectRecord {
            project_id: "demo-1".into(),
            project_name: "Demo".into(),
            project_number: "1234".into(),
            lifecycle_state: LifecycleState::from(state.to_string()),
        }
    }

    #[test]
    fn lifecycle_state_round_trips_unknown_values() {
        let state = LifecycleState::from("DELETE_IN_PROGRESS".to_string());
        assert_eq!(state, LifecycleState::Other("DELETE_IN_PROGRESS".into()));
        assert_eq!(state.to_string(), "DELETE_IN_PROGRESS");

        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(json, "\"DELETE_IN_PROGRESS\"");
        let back: LifecycleState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn resource_summary_total_sums_every_category() {
        let summary = ResourceSummary {
            instances: 1,
            disks: 2,
            snapshots: 3,
            images: 4,
            buckets: 5,
            sql_instances: 6,
            app_engines: 7,
            cloud_functions: 8,
            other: 9,
        };
        assert_eq!(summary.total(), 45);
    }

    #[test]
    fn classified_outcome_maps_classification_to_status() {
        let verdict = ActivityVerdict {
            last_activity: None,
            days_since_activity: None,
            classification: Classification::Obsolete,
            obsolete_reasons: vec!["No resources found".into()],
        };
        let outcome =
            AnalysisOutcome::classified(&project("ACTIVE"), ResourceSummary::default(), verdict);
        assert_eq!(outcome.deletion_status, DeletionStatus::SafeToDelete);
        assert!(outcome.is_terminal());

        let verdict = ActivityVerdict {
            last_activity: None,
            days_since_activity: None,
            classification: Classification::Active,
            obsolete_reasons: vec![],
        };
        let outcome =
            AnalysisOutcome::classified(&project("ACTIVE"), ResourceSummary::default(), verdict);
        assert_eq!(outcome.deletion_status, DeletionStatus::Pending);
        assert!(!outcome.is_terminal());
    }

    #[test]
    fn skipped_outcome_is_terminal_and_carries_the_reason() {
        let outcome = AnalysisOutcome::skipped(
            &project("ACTIVE"),
            Classification::PotentiallyObsolete,
            "Scan skipped: quota exceeded",
        );
        assert_eq!(outcome.deletion_status, DeletionStatus::Skipped);
        assert_eq!(outcome.obsolete_reasons, vec!["Scan skipped: quota exceeded"]);
        assert!(outcome.is_terminal());
    }

    #[test]
    fn outcome_serde_round_trip() {
        let verdict = ActivityVerdict {
            last_activity: Some("2026-01-15T10:00:00Z".parse().unwrap()),
            days_since_activity: Some(120),
            classification: Classification::PotentiallyObsolete,
            obsolete_reasons: vec!["Low activity (last used 120 days ago)".into()],
        };
        let outcome = AnalysisOutcome::classified(
            &project("ACTIVE"),
            ResourceSummary {
                buckets: 2,
                ..Default::default()
            },
            verdict,
        );
        let json = serde_json::to_string_pretty(&outcome).unwrap();
        assert!(json.contains("\"classification\": \"potentially_obsolete\""));
        assert!(json.contains("\"deletion_status\": \"review_required\""));
        // deleted_at is absent until a sweep sets it
        assert!(!json.contains("deleted_at"));
        let back: AnalysisOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(back, outcome);
    }
}
