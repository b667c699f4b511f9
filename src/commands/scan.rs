//! The `scan` command: list accessible projects, inventory their
//! resources in parallel, classify each one, and persist the report
//! artifacts after every completed project.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use colored::Colorize;

use crate::cloud::{GcloudClient, ProjectLister, RetryPolicy};
use crate::core::{Classification, DeletionStatus, ProjectRecord};
use crate::progress::{ProgressConfig, ProgressManager, TEMPLATE_SCAN};
use crate::scan::{run_scan, ScanOptions, ScanStats};
use crate::store::{Store, StorePaths};

pub struct ScanConfig {
    pub workers: usize,
    pub limit: Option<usize>,
    pub sequential: bool,
    pub fresh: bool,
    pub fail_on_quota: bool,
    pub timeout: u64,
    pub output_dir: PathBuf,
    pub verbosity: u8,
    pub quiet: bool,
}

pub fn handle_scan(config: ScanConfig) -> Result<()> {
    let progress_config = ProgressConfig::from_env(config.quiet, config.verbosity);
    ProgressManager::init_global(progress_config.clone());
    let manager =
        ProgressManager::global().unwrap_or_else(|| ProgressManager::new(progress_config));

    let started = Instant::now();

    fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "failed to create output directory {}",
            config.output_dir.display()
        )
    })?;
    let paths = StorePaths::in_dir(&config.output_dir);
    let store = Store::load(paths, config.fresh)?;
    if !store.is_empty() {
        log::info!(
            "resuming: {} project(s) already recorded in {}",
            store.len(),
            store.paths().report.display()
        );
    }

    let client = GcloudClient::new(Duration::from_secs(config.timeout));

    let spinner = manager.create_spinner("Listing accessible projects");
    let list_result = client.list_projects();
    spinner.finish_and_clear();
    let mut projects = list_result.context("failed to list accessible projects")?;
    log::info!("found {} accessible project(s)", projects.len());

    if let Some(limit) = config.limit {
        projects.truncate(limit);
    }

    let known = store.known_ids();
    let total_listed = projects.len();
    let worklist: Vec<ProjectRecord> = projects
        .into_iter()
        .filter(|p| !known.contains(&p.project_id))
        .collect();
    let already_done = total_listed - worklist.len();
    if already_done > 0 {
        log::info!("skipping {} already-analyzed project(s)", already_done);
    }

    let stats = if worklist.is_empty() {
        log::info!("nothing to scan");
        ScanStats::default()
    } else {
        let bar = manager.create_bar(worklist.len() as u64, TEMPLATE_SCAN);
        bar.set_message("scanning");
        let opts = ScanOptions {
            workers: effective_workers(config.workers),
            sequential: config.sequential,
            fail_on_quota: config.fail_on_quota,
            retry: RetryPolicy::default(),
        };
        let result = run_scan(&client, &worklist, &store, &opts, &bar);
        bar.finish_and_clear();
        // On a fatal error the store keeps in_progress=true so the next
        // run resumes from the completed entries.
        result?
    };

    store.finalize()?;
    let _ = manager.clear();
    print_scan_summary(&store, &stats, started.elapsed());
    Ok(())
}

fn effective_workers(workers: usize) -> usize {
    match workers {
        0 => num_cpus::get(),
        n => n,
    }
}

fn print_scan_summary(store: &Store, stats: &ScanStats, elapsed: Duration) {
    let outcomes = store.snapshot();
    let obsolete = outcomes
        .iter()
        .filter(|o| o.classification == Classification::Obsolete)
        .count();
    let review = outcomes
        .iter()
        .filter(|o| o.classification == Classification::PotentiallyObsolete)
        .count();
    let active = outcomes
        .iter()
        .filter(|o| o.classification == Classification::Active)
        .count();
    let unscanned = outcomes
        .iter()
        .filter(|o| o.deletion_status == DeletionStatus::Skipped)
        .count();

    println!();
    println!(
        "{} {} project(s) analyzed in {:.1}s ({} new, {} skipped this run)",
        "Scan complete:".bold(),
        outcomes.len(),
        elapsed.as_secs_f64(),
        stats.completed,
        stats.skipped
    );
    println!("  {} {}", "obsolete:".red(), obsolete);
    println!("  {} {}", "needs review:".yellow(), review);
    println!("  {} {}", "active:".green(), active);
    if unscanned > 0 {
        println!("  {} {}", "unscanned (errors):".yellow(), unscanned);
    }
    println!();
    println!("Report:   {}", store.paths().report.display());
    println!("Deletion: {}", store.paths().deletion.display());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_workers_falls_back_to_cpu_count() {
        assert_eq!(effective_workers(0), num_cpus::get());
        assert_eq!(effective_workers(4), 4);
    }
}
