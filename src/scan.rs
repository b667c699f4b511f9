//! Worker-pool orchestrator for the scan phase.
//!
//! Fans per-project analyses out across a bounded rayon pool and hands each
//! outcome to the store the moment it completes, so the artifacts always
//! reflect real-time progress regardless of submission order. The store
//! serializes writers internally; the progress counter is its own atomic so
//! reporting is never blocked behind a file write.

use crate::classify::classify;
use crate::cloud::{CloudError, ResourceInventory, RetryPolicy};
use crate::core::{AnalysisOutcome, Classification, ProjectRecord};
use crate::store::Store;
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use indicatif::ProgressBar;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const DEFAULT_WORKERS: usize = 10;

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Worker budget. 1 degrades to fully sequential execution.
    pub workers: usize,
    /// Force sequential execution regardless of `workers`.
    pub sequential: bool,
    /// Abort the run on quota exhaustion instead of skipping the project.
    pub fail_on_quota: bool,
    pub retry: RetryPolicy,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            sequential: false,
            fail_on_quota: false,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    completed: AtomicUsize,
    skipped: AtomicUsize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Outcomes recorded, including skip outcomes.
    pub completed: usize,
    /// Subset of `completed` that was skipped rather than classified.
    pub skipped: usize,
}

/// Analyze every project in `worklist` exactly once, recording each outcome
/// as soon as it is ready. Returns early with an error on permission denial,
/// on quota under `--fail-on-quota`, or on any persistence failure; already
/// recorded outcomes are never rolled back.
pub fn run_scan<I>(
    inventory: &I,
    worklist: &[ProjectRecord],
    store: &Store,
    opts: &ScanOptions,
    progress: &ProgressBar,
) -> Result<ScanStats>
where
    I: ResourceInventory + Sync,
{
    let total = worklist.len();
    let counters = Counters::default();

    if opts.sequential || opts.workers <= 1 {
        log::info!("scanning {total} project(s) sequentially");
        worklist
            .iter()
            .try_for_each(|p| analyze_one(inventory, p, store, opts, &counters, total, progress))?;
    } else {
        let workers = opts.workers.min(total.max(1));
        log::info!("scanning {total} project(s) with {workers} workers");
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .context("failed to build worker pool")?;
        pool.install(|| {
            worklist
                .par_iter()
                .try_for_each(|p| analyze_one(inventory, p, store, opts, &counters, total, progress))
        })?;
    }

    Ok(ScanStats {
        completed: counters.completed.load(Ordering::SeqCst),
        skipped: counters.skipped.load(Ordering::SeqCst),
    })
}

/// One unit of work: inventory query, classification, persistence.
fn analyze_one<I: ResourceInventory>(
    inventory: &I,
    project: &ProjectRecord,
    store: &Store,
    opts: &ScanOptions,
    counters: &Counters,
    total: usize,
    progress: &ProgressBar,
) -> Result<()> {
    let id = &project.project_id;
    let fetched = opts.retry.run(id, || inventory.list_resources(id));

    let outcome = match fetched {
        Ok(records) => {
            log::debug!("{id}: {} resource record(s)", records.len());
            let (summary, verdict) = classify(&project.lifecycle_state, &records, Utc::now());
            AnalysisOutcome::classified(project, summary, verdict)
        }
        Err(err @ CloudError::PermissionDenied { .. }) => {
            return Err(anyhow!(err).context(format!("permission denied scanning {id}")));
        }
        Err(CloudError::QuotaExceeded) if opts.fail_on_quota => {
            return Err(anyhow!("quota exceeded while scanning {id}"));
        }
        Err(CloudError::QuotaExceeded) => {
            log::warn!("{id}: quota exceeded, skipping");
            counters.skipped.fetch_add(1, Ordering::SeqCst);
            AnalysisOutcome::skipped(
                project,
                Classification::PotentiallyObsolete,
                "Scan skipped: quota exceeded",
            )
        }
        Err(CloudError::NotFound) => {
            // Vanished between listing and scanning; terminal, never retried.
            log::warn!("{id}: project not found, recording terminal skip");
            counters.skipped.fetch_add(1, Ordering::SeqCst);
            AnalysisOutcome::skipped(project, Classification::Obsolete, "Project not found")
        }
        Err(err) => {
            log::warn!("{id}: giving up after retries ({err}), skipping");
            counters.skipped.fetch_add(1, Ordering::SeqCst);
            AnalysisOutcome::skipped(
                project,
                Classification::PotentiallyObsolete,
                format!("Scan skipped: {err}"),
            )
        }
    };

    store
        .record(outcome)
        .with_context(|| format!("failed to persist outcome for {id}"))?;

    let done = counters.completed.fetch_add(1, Ordering::SeqCst) + 1;
    progress.inc(1);
    log::info!("[{done}/{total}] completed {id}");
    Ok(())
}
