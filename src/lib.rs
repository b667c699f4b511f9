// Export modules for library usage
pub mod classify;
pub mod cli;
pub mod cloud;
pub mod commands;
pub mod core;
pub mod progress;
pub mod scan;
pub mod store;
pub mod sweep;

// Re-export commonly used types
pub use crate::core::{
    AnalysisOutcome, Classification, DeletionStatus, LifecycleState, ProjectRecord,
    ResourceRecord, ResourceSummary,
};

pub use crate::cloud::{
    CloudError, GcloudClient, ProjectDeleter, ProjectLister, ResourceInventory, RetryPolicy,
};

pub use crate::scan::{run_scan, ScanOptions, ScanStats};
pub use crate::store::{Store, StorePaths, DELETION_FILE, REPORT_FILE};
pub use crate::sweep::{run_sweep, SweepOptions, SweepReport, SweepState, CONFIRM_PHRASE};
