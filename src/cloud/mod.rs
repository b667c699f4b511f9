//! External collaborator seams: project listing, resource inventory, and
//! project deletion, plus the error taxonomy and retry policy shared by the
//! scan orchestrator.
//!
//! The traits keep the pipeline testable with in-memory fakes; the one real
//! implementation shells out to `gcloud` (see [`gcloud`]).

pub mod gcloud;

pub use gcloud::GcloudClient;

use crate::core::{ProjectRecord, ResourceRecord};
use std::time::Duration;
use thiserror::Error;

/// Failure kinds a collaborator call can produce.
///
/// The kind drives the orchestrator's policy: quota skips (or aborts under
/// `--fail-on-quota`), permission denial aborts the run, not-found is a
/// terminal per-project outcome, and timeouts/transport failures are retried
/// before falling back to a skip.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CloudError {
    #[error("quota exceeded")]
    QuotaExceeded,

    #[error("permission denied: {message}")]
    PermissionDenied { message: String },

    #[error("project not found")]
    NotFound,

    #[error("timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("transport failure: {message}")]
    Transport { message: String },

    #[error("malformed response: {message}")]
    Malformed { message: String },
}

impl CloudError {
    pub fn transport(message: impl Into<String>) -> Self {
        CloudError::Transport {
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        CloudError::Malformed {
            message: message.into(),
        }
    }

    /// Transient failures worth another attempt. Quota is transient too but
    /// retrying it immediately only burns more quota, so it is not listed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CloudError::Timeout { .. } | CloudError::Transport { .. } | CloudError::Malformed { .. }
        )
    }
}

/// Lists the candidate projects to audit.
pub trait ProjectLister {
    fn list_projects(&self) -> Result<Vec<ProjectRecord>, CloudError>;
}

/// One inventory query per project, returning every resource record with its
/// asset-type tag and timestamps.
pub trait ResourceInventory {
    fn list_resources(&self, project_id: &str) -> Result<Vec<ResourceRecord>, CloudError>;
}

/// Performs the actual project deletion.
pub trait ProjectDeleter {
    fn delete_project(&self, project_id: &str) -> Result<(), CloudError>;
}

/// Bounded retry with linear backoff for transient collaborator failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Run `op`, retrying retryable errors up to `max_attempts` total
    /// attempts, sleeping `backoff * attempt` between tries. Non-retryable
    /// errors surface immediately.
    pub fn run<T>(
        &self,
        label: &str,
        mut op: impl FnMut() -> Result<T, CloudError>,
    ) -> Result<T, CloudError> {
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    log::warn!(
                        "{label}: attempt {attempt}/{} failed ({err}), retrying",
                        self.max_attempts
                    );
                    std::thread::sleep(self.backoff * attempt);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
