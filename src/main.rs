use anyhow::Result;
use projsweep::cli::{self, Commands};
use projsweep::commands::{handle_scan, handle_sweep, ScanConfig, SweepConfig};

// Main orchestrator function
fn main() -> Result<()> {
    let cli = cli::parse_args();

    match cli.command {
        Commands::Scan {
            workers,
            limit,
            sequential,
            fresh,
            fail_on_quota,
            timeout,
            output_dir,
            verbosity,
            quiet,
        } => {
            init_logging(verbosity, quiet);
            handle_scan(ScanConfig {
                workers,
                limit,
                sequential,
                fresh,
                fail_on_quota,
                timeout,
                output_dir,
                verbosity,
                quiet,
            })
        }
        Commands::Sweep {
            execute,
            include_review,
            input,
            timeout,
            verbosity,
            quiet,
        } => {
            init_logging(verbosity, quiet);
            handle_sweep(SweepConfig {
                execute,
                include_review,
                input,
                timeout,
                verbosity,
                quiet,
            })
        }
    }
}

fn init_logging(verbosity: u8, quiet: bool) {
    let default_level = if quiet {
        "error"
    } else {
        match verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .init();
}
