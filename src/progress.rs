//! Progress feedback for the scan and sweep phases, built on `indicatif`.
//!
//! Progress bars are suppressed in quiet mode, at `-vv` and above (log
//! lines own stderr then), and when stderr is not a TTY (CI, piped
//! output); in all those cases hidden bars are handed out so call sites
//! never branch.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex};

pub const TEMPLATE_SCAN: &str = "{msg} {pos}/{len} projects ({percent}%) - {eta}";
pub const TEMPLATE_SWEEP: &str = "{msg} {pos}/{len} projects - {eta}";
pub const TEMPLATE_SPINNER: &str = "{spinner} {msg}";

/// Configuration for progress display behavior.
#[derive(Debug, Clone, Default)]
pub struct ProgressConfig {
    pub quiet_mode: bool,
    pub verbosity: u8,
}

impl ProgressConfig {
    pub fn from_env(quiet: bool, verbosity: u8) -> Self {
        let env_quiet = std::env::var("PROJSWEEP_QUIET").is_ok();
        Self {
            quiet_mode: quiet || env_quiet,
            verbosity,
        }
    }

    pub fn should_show_progress(&self) -> bool {
        if self.quiet_mode {
            return false;
        }
        // At -vv and above the per-project log lines own stderr; bar
        // redraws would just shred them.
        if self.verbosity >= 2 {
            return false;
        }
        use std::io::IsTerminal;
        std::io::stderr().is_terminal()
    }
}

static GLOBAL_PROGRESS: Lazy<Arc<Mutex<Option<ProgressManager>>>> =
    Lazy::new(|| Arc::new(Mutex::new(None)));

/// Centralized manager so concurrent bars share one draw target.
#[derive(Clone)]
pub struct ProgressManager {
    multi: Arc<MultiProgress>,
    config: ProgressConfig,
}

impl ProgressManager {
    pub fn new(config: ProgressConfig) -> Self {
        Self {
            multi: Arc::new(MultiProgress::new()),
            config,
        }
    }

    pub fn init_global(config: ProgressConfig) {
        let manager = Self::new(config);
        *GLOBAL_PROGRESS.lock().unwrap() = Some(manager);
    }

    pub fn global() -> Option<Self> {
        GLOBAL_PROGRESS.lock().unwrap().clone()
    }

    /// Create a progress bar, or a hidden one when progress is suppressed.
    pub fn create_bar(&self, len: u64, template: &str) -> ProgressBar {
        if !self.config.should_show_progress() {
            return ProgressBar::hidden();
        }
        let pb = self.multi.add(ProgressBar::new(len));
        pb.set_style(
            ProgressStyle::default_bar()
                .template(template)
                .expect("Invalid progress bar template")
                .progress_chars("█▓▒░  "),
        );
        pb
    }

    pub fn create_spinner(&self, msg: &str) -> ProgressBar {
        if !self.config.should_show_progress() {
            return ProgressBar::hidden();
        }
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(
            ProgressStyle::default_spinner()
                .template(TEMPLATE_SPINNER)
                .expect("Invalid spinner template")
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }

    /// Clear every bar; call before printing the final summary.
    pub fn clear(&self) -> std::io::Result<()> {
        self.multi.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_mode_disables_progress() {
        let config = ProgressConfig {
            quiet_mode: true,
            verbosity: 0,
        };
        assert!(!config.should_show_progress());
    }

    #[test]
    fn high_verbosity_disables_progress() {
        let config = ProgressConfig {
            quiet_mode: false,
            verbosity: 2,
        };
        assert!(!config.should_show_progress());
    }

    #[test]
    fn hidden_bars_in_quiet_mode() {
        let manager = ProgressManager::new(ProgressConfig {
            quiet_mode: true,
            verbosity: 0,
        });
        let pb = manager.create_bar(10, TEMPLATE_SCAN);
        assert!(pb.is_hidden());
        let spinner = manager.create_spinner("listing projects");
        assert!(spinner.is_hidden());
    }
}
