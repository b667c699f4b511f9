//! The `sweep` command: read the deletion-ready artifact, confirm with
//! the operator, and delete the listed projects one at a time.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use colored::Colorize;

use crate::cloud::GcloudClient;
use crate::progress::{ProgressConfig, ProgressManager, TEMPLATE_SWEEP};
use crate::store::StorePaths;
use crate::sweep::{run_sweep, SweepOptions, SweepReport, SweepState, CONFIRM_PHRASE};

pub struct SweepConfig {
    pub execute: bool,
    pub include_review: bool,
    pub input: PathBuf,
    pub timeout: u64,
    pub verbosity: u8,
    pub quiet: bool,
}

pub fn handle_sweep(config: SweepConfig) -> Result<()> {
    let progress_config = ProgressConfig::from_env(config.quiet, config.verbosity);
    ProgressManager::init_global(progress_config.clone());
    let manager =
        ProgressManager::global().unwrap_or_else(|| ProgressManager::new(progress_config));

    let paths = StorePaths::for_deletion_file(&config.input);
    let client = GcloudClient::new(Duration::from_secs(config.timeout));
    let opts = SweepOptions {
        execute: config.execute,
        include_review: config.include_review,
    };

    // Length is unknown until the artifact is loaded; run_sweep sets it
    // before the first deletion attempt.
    let bar = manager.create_bar(0, TEMPLATE_SWEEP);
    bar.set_message("deleting");
    let mut confirm = || prompt_confirmation();
    let result = run_sweep(&paths, &opts, &client, &mut confirm, &bar);
    bar.finish_and_clear();
    let _ = manager.clear();
    let report = result?;
    print_sweep_summary(&report, &opts);

    match report.state {
        SweepState::Failed => {
            let reason = report
                .failure
                .unwrap_or_else(|| "unknown persistence failure".to_string());
            bail!("sweep stopped early: {reason}");
        }
        SweepState::Done if opts.execute && !report.failed.is_empty() => {
            bail!("{} deletion(s) failed", report.failed.len());
        }
        _ => Ok(()),
    }
}

fn prompt_confirmation() -> Result<String> {
    println!();
    println!(
        "{}",
        "WARNING: this will permanently delete the projects listed above."
            .red()
            .bold()
    );
    print!("Type {} to continue: ", CONFIRM_PHRASE.bold());
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line)
}

fn print_sweep_summary(report: &SweepReport, opts: &SweepOptions) {
    if report.already_deleted > 0 {
        println!(
            "{} project(s) already deleted in a previous run",
            report.already_deleted
        );
    }

    if report.candidates.is_empty() {
        println!("{}", "No projects pending deletion.".green());
        return;
    }

    match report.state {
        SweepState::Done if !opts.execute => {
            println!(
                "{} {} project(s) would be deleted:",
                "Dry run:".bold(),
                report.candidates.len()
            );
            for id in &report.candidates {
                println!("  {}", id.red());
            }
            println!();
            println!("Re-run with --execute to delete them.");
        }
        SweepState::Aborted => {
            println!("{}", "Aborted: confirmation did not match.".yellow());
        }
        _ => {
            for id in &report.deleted {
                println!("  {} {}", "deleted".green(), id);
            }
            for (id, reason) in &report.failed {
                println!("  {} {}: {}", "failed".red(), id, reason);
            }
            println!();
            println!(
                "{} {} deleted, {} failed",
                "Sweep complete:".bold(),
                report.deleted.len(),
                report.failed.len()
            );
        }
    }
}
