//! Inventory classifier: collapse a project's raw resource records into a
//! `ResourceSummary` and an `ActivityVerdict`.
//!
//! Pure functions only. `now` is injected so the verdict is reproducible;
//! the scan orchestrator samples the clock, not this module.

use crate::core::{
    ActivityVerdict, Classification, LifecycleState, ResourceRecord, ResourceSummary,
};
use chrono::{DateTime, Utc};

/// Days of silence past which a project is definitely obsolete.
pub const OBSOLETE_AFTER_DAYS: i64 = 180;
/// Days of silence past which a project needs human review.
pub const REVIEW_AFTER_DAYS: i64 = 90;

/// Bucket a Cloud Asset Inventory type tag into a summary category.
fn bump_category(summary: &mut ResourceSummary, asset_type: &str) {
    let slot = match asset_type {
        "compute.googleapis.com/Instance" => &mut summary.instances,
        "compute.googleapis.com/Disk" => &mut summary.disks,
        "compute.googleapis.com/Snapshot" => &mut summary.snapshots,
        "compute.googleapis.com/Image" => &mut summary.images,
        "storage.googleapis.com/Bucket" => &mut summary.buckets,
        "sqladmin.googleapis.com/Instance" => &mut summary.sql_instances,
        "appengine.googleapis.com/Application" | "appengine.googleapis.com/Version" => {
            &mut summary.app_engines
        }
        "cloudfunctions.googleapis.com/CloudFunction" => &mut summary.cloud_functions,
        _ => &mut summary.other,
    };
    *slot += 1;
}

/// Single pass over the records: per-category counts plus the most recent
/// activity timestamp (`update_time` preferred, `create_time` fallback).
pub fn summarize(records: &[ResourceRecord]) -> (ResourceSummary, Option<DateTime<Utc>>) {
    let mut summary = ResourceSummary::default();
    let mut last_activity: Option<DateTime<Utc>> = None;
    for record in records {
        bump_category(&mut summary, &record.asset_type);
        if let Some(ts) = record.activity_time() {
            last_activity = Some(match last_activity {
                Some(prev) => prev.max(ts),
                None => ts,
            });
        }
    }
    (summary, last_activity)
}

/// Apply the obsolescence policy. First match wins:
///
/// 1. lifecycle state not ACTIVE -> obsolete
/// 2. no resources at all -> obsolete
/// 3. more than 180 days idle -> obsolete
/// 4. 91..=180 days idle -> potentially obsolete
/// 5. otherwise -> active
///
/// Resources with no usable timestamps leave `days_since_activity` unknown;
/// that routes to review ("Activity undetermined") rather than active, so a
/// stale project can never hide behind missing metadata.
pub fn classify(
    lifecycle_state: &LifecycleState,
    records: &[ResourceRecord],
    now: DateTime<Utc>,
) -> (ResourceSummary, ActivityVerdict) {
    let (summary, last_activity) = summarize(records);
    let days_since_activity = last_activity.map(|ts| (now - ts).num_days());

    let (classification, obsolete_reasons) = if !lifecycle_state.is_active() {
        (
            Classification::Obsolete,
            vec![format!("Project lifecycle state is {lifecycle_state}")],
        )
    } else if records.is_empty() {
        (Classification::Obsolete, vec!["No resources found".to_string()])
    } else {
        match days_since_activity {
            Some(days) if days > OBSOLETE_AFTER_DAYS => (
                Classification::Obsolete,
                vec![format!("No activity for {days} days")],
            ),
            Some(days) if days > REVIEW_AFTER_DAYS => (
                Classification::PotentiallyObsolete,
                vec![format!("Low activity (last used {days} days ago)")],
            ),
            Some(_) => (Classification::Active, vec![]),
            None => (
                Classification::PotentiallyObsolete,
                vec!["Activity undetermined".to_string()],
            ),
        }
    };

    let verdict = ActivityVerdict {
        last_activity,
        days_since_activity,
        classification,
        obsolete_reasons,
    };
    (summary, verdict)
}
