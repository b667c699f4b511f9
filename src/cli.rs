use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "projsweep")]
#[command(about = "Audit cloud projects for obsolescence and sweep the obsolete ones", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan every accessible project and classify it (resumes by default)
    Scan {
        /// Number of parallel workers (0 = one per CPU core)
        #[arg(long, default_value = "10")]
        workers: usize,

        /// Analyze only the first N projects (useful for testing)
        #[arg(long)]
        limit: Option<usize>,

        /// Disable parallel processing (single worker, for debugging)
        #[arg(long)]
        sequential: bool,

        /// Discard previous artifacts and start a fresh analysis
        #[arg(long)]
        fresh: bool,

        /// Abort the whole run on quota exhaustion instead of skipping
        #[arg(long = "fail-on-quota")]
        fail_on_quota: bool,

        /// Timeout in seconds for each gcloud command
        #[arg(long, default_value = "30")]
        timeout: u64,

        /// Directory holding the two output artifacts
        #[arg(long = "output-dir", default_value = ".")]
        output_dir: PathBuf,

        /// Increase verbosity level (can be repeated: -v, -vv)
        #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
        verbosity: u8,

        /// Suppress progress output
        #[arg(long, env = "PROJSWEEP_QUIET")]
        quiet: bool,
    },

    /// Delete candidate projects from the deletion-ready artifact
    Sweep {
        /// Actually delete projects (default is a dry run)
        #[arg(long)]
        execute: bool,

        /// Also sweep projects in the review tier
        #[arg(long = "include-review")]
        include_review: bool,

        /// Deletion-ready artifact to read and update
        #[arg(long, default_value = crate::store::DELETION_FILE)]
        input: PathBuf,

        /// Timeout in seconds for each gcloud command
        #[arg(long, default_value = "30")]
        timeout: u64,

        /// Increase verbosity level (can be repeated: -v, -vv)
        #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
        verbosity: u8,

        /// Suppress progress output
        #[arg(long, env = "PROJSWEEP_QUIET")]
        quiet: bool,
    },
}

pub fn parse_args() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing_scan_command() {
        let args = vec![
            "projsweep",
            "scan",
            "--workers",
            "20",
            "--limit",
            "10",
            "--fresh",
            "--fail-on-quota",
        ];

        let cli = Cli::parse_from(args);

        match cli.command {
            Commands::Scan {
                workers,
                limit,
                sequential,
                fresh,
                fail_on_quota,
                timeout,
                ..
            } => {
                assert_eq!(workers, 20);
                assert_eq!(limit, Some(10));
                assert!(!sequential);
                assert!(fresh);
                assert!(fail_on_quota);
                assert_eq!(timeout, 30);
            }
            _ => panic!("Expected Scan command"),
        }
    }

    #[test]
    fn test_cli_parsing_scan_defaults() {
        let cli = Cli::parse_from(vec!["projsweep", "scan"]);

        match cli.command {
            Commands::Scan {
                workers,
                limit,
                sequential,
                fresh,
                output_dir,
                ..
            } => {
                assert_eq!(workers, 10);
                assert_eq!(limit, None);
                assert!(!sequential);
                assert!(!fresh);
                assert_eq!(output_dir, PathBuf::from("."));
            }
            _ => panic!("Expected Scan command"),
        }
    }

    #[test]
    fn test_cli_parsing_sweep_command() {
        let args = vec![
            "projsweep",
            "sweep",
            "--execute",
            "--include-review",
            "--input",
            "/tmp/candidates.json",
        ];

        let cli = Cli::parse_from(args);

        match cli.command {
            Commands::Sweep {
                execute,
                include_review,
                input,
                ..
            } => {
                assert!(execute);
                assert!(include_review);
                assert_eq!(input, PathBuf::from("/tmp/candidates.json"));
            }
            _ => panic!("Expected Sweep command"),
        }
    }

    #[test]
    fn test_cli_parsing_sweep_defaults_to_dry_run() {
        let cli = Cli::parse_from(vec!["projsweep", "sweep"]);

        match cli.command {
            Commands::Sweep {
                execute,
                include_review,
                input,
                ..
            } => {
                assert!(!execute);
                assert!(!include_review);
                assert_eq!(input, PathBuf::from(crate::store::DELETION_FILE));
            }
            _ => panic!("Expected Sweep command"),
        }
    }

    #[test]
    fn test_verbosity_counting() {
        let cli = Cli::parse_from(vec!["projsweep", "scan", "-vv"]);
        match cli.command {
            Commands::Scan { verbosity, .. } => assert_eq!(verbosity, 2),
            _ => panic!("Expected Scan command"),
        }
    }
}
