//! `gcloud`-backed collaborator implementation.
//!
//! Every call shells out to the `gcloud` CLI with `--format json` and a
//! wall-clock timeout. The inventory uses the Cloud Asset Inventory API
//! (`gcloud asset search-all-resources`), which replaces many per-service
//! listings with a single query per project.

use crate::cloud::{CloudError, ProjectDeleter, ProjectLister, ResourceInventory};
use crate::core::{LifecycleState, ProjectRecord, ResourceRecord};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Wire shape of `gcloud projects list` entries.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProject {
    project_id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    project_number: Option<serde_json::Value>,
    #[serde(default)]
    lifecycle_state: Option<String>,
}

impl From<RawProject> for ProjectRecord {
    fn from(raw: RawProject) -> Self {
        let project_number = match raw.project_number {
            Some(serde_json::Value::String(s)) => s,
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        ProjectRecord {
            project_name: raw.name.unwrap_or_else(|| raw.project_id.clone()),
            project_id: raw.project_id,
            project_number,
            lifecycle_state: LifecycleState::from(
                raw.lifecycle_state.unwrap_or_else(|| "UNKNOWN".to_string()),
            ),
        }
    }
}

/// Wire shape of `gcloud asset search-all-resources` entries.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAsset {
    #[serde(default)]
    asset_type: String,
    #[serde(default)]
    update_time: Option<DateTime<Utc>>,
    #[serde(default)]
    create_time: Option<DateTime<Utc>>,
}

impl From<RawAsset> for ResourceRecord {
    fn from(raw: RawAsset) -> Self {
        ResourceRecord {
            asset_type: raw.asset_type,
            update_time: raw.update_time,
            create_time: raw.create_time,
        }
    }
}

/// Map a failed `gcloud` invocation's stderr onto an error kind.
fn classify_failure(stderr: &str) -> CloudError {
    let lower = stderr.to_lowercase();
    if lower.contains("resource_exhausted")
        || lower.contains("quota exceeded")
        || lower.contains("rate limit")
    {
        CloudError::QuotaExceeded
    } else if lower.contains("permission_denied")
        || lower.contains("permission denied")
        || lower.contains("(403)")
    {
        CloudError::PermissionDenied {
            message: first_line(stderr),
        }
    } else if lower.contains("not_found")
        || lower.contains("not found")
        || lower.contains("does not exist")
        || lower.contains("(404)")
    {
        CloudError::NotFound
    } else {
        CloudError::transport(first_line(stderr))
    }
}

fn first_line(text: &str) -> String {
    text.lines()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("unknown error")
        .trim()
        .to_string()
}

/// Drain a child pipe on its own thread so a full pipe buffer can never
/// wedge the child while we poll for exit.
fn drain_pipe<R: Read + Send + 'static>(pipe: Option<R>) -> std::thread::JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn wait_with_timeout(mut child: Child, timeout: Duration) -> Result<(bool, String, String), CloudError> {
    let stdout = drain_pipe(child.stdout.take());
    let stderr = drain_pipe(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(CloudError::Timeout {
                        seconds: timeout.as_secs(),
                    });
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(e) => return Err(CloudError::transport(format!("wait failed: {e}"))),
        }
    };

    let stdout = String::from_utf8_lossy(&stdout.join().unwrap_or_default()).into_owned();
    let stderr = String::from_utf8_lossy(&stderr.join().unwrap_or_default()).into_owned();
    Ok((status.success(), stdout, stderr))
}

/// Collaborator that drives the `gcloud` CLI.
#[derive(Debug, Clone)]
pub struct GcloudClient {
    timeout: Duration,
}

impl GcloudClient {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn run_json(&self, args: &[&str], timeout: Duration) -> Result<serde_json::Value, CloudError> {
        let start = Instant::now();
        log::debug!("gcloud {} (timeout {}s)", args.join(" "), timeout.as_secs());

        let child = Command::new("gcloud")
            .args(args)
            .args(["--format", "json"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CloudError::transport(format!("failed to spawn gcloud: {e}")))?;

        let (success, stdout, stderr) = wait_with_timeout(child, timeout)?;
        log::debug!(
            "gcloud {} finished in {:.2}s ({} bytes)",
            args.first().copied().unwrap_or(""),
            start.elapsed().as_secs_f64(),
            stdout.len()
        );

        if !success {
            return Err(classify_failure(&stderr));
        }
        if stdout.trim().is_empty() {
            return Ok(serde_json::Value::Array(vec![]));
        }
        serde_json::from_str(&stdout).map_err(|e| CloudError::malformed(e.to_string()))
    }
}

impl ProjectLister for GcloudClient {
    fn list_projects(&self) -> Result<Vec<ProjectRecord>, CloudError> {
        let value = self.run_json(&["projects", "list"], self.timeout)?;
        let raw: Vec<RawProject> =
            serde_json::from_value(value).map_err(|e| CloudError::malformed(e.to_string()))?;
        Ok(raw.into_iter().map(ProjectRecord::from).collect())
    }
}

impl ResourceInventory for GcloudClient {
    fn list_resources(&self, project_id: &str) -> Result<Vec<ResourceRecord>, CloudError> {
        let scope = format!("projects/{project_id}");
        // The asset search does the work of many per-service listings, so it
        // gets double the budget.
        let value = self.run_json(
            &["asset", "search-all-resources", "--scope", &scope],
            self.timeout * 2,
        )?;
        let raw: Vec<RawAsset> =
            serde_json::from_value(value).map_err(|e| CloudError::malformed(e.to_string()))?;
        Ok(raw.into_iter().map(ResourceRecord::from).collect())
    }
}

impl ProjectDeleter for GcloudClient {
    fn delete_project(&self, project_id: &str) -> Result<(), CloudError> {
        self.run_json(&["projects", "delete", project_id, "--quiet"], self.timeout)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn stderr_classification_covers_the_error_kinds() {
        assert_eq!(
            classify_failure("ERROR: (gcloud.asset) RESOURCE_EXHAUSTED: Quota exceeded"),
            CloudError::QuotaExceeded
        );
        assert_eq!(
            classify_failure("ERROR: too many requests, rate limit hit"),
            CloudError::QuotaExceeded
        );
        assert!(matches!(
            classify_failure("ERROR: (gcloud.projects.list) PERMISSION_DENIED: caller lacks role"),
            CloudError::PermissionDenied { .. }
        ));
        assert_eq!(
            classify_failure("ERROR: project my-project does not exist (404)"),
            CloudError::NotFound
        );
        assert!(matches!(
            classify_failure("ERROR: connection reset by peer"),
            CloudError::Transport { .. }
        ));
    }

    #[test]
    fn raw_project_parses_list_output() {
        let json = indoc! {r#"
            [
              {"projectId": "demo-1", "name": "Demo", "projectNumber": "123456", "lifecycleState": "ACTIVE"},
              {"projectId": "bare", "projectNumber": 789}
            ]
        "#};
        let raw: Vec<RawProject> = serde_json::from_str(json).unwrap();
        let projects: Vec<ProjectRecord> = raw.into_iter().map(ProjectRecord::from).collect();

        assert_eq!(projects[0].project_id, "demo-1");
        assert_eq!(projects[0].project_name, "Demo");
        assert_eq!(projects[0].project_number, "123456");
        assert!(projects[0].lifecycle_state.is_active());

        // Missing fields degrade instead of failing the whole listing.
        assert_eq!(projects[1].project_name, "bare");
        assert_eq!(projects[1].project_number, "789");
        assert_eq!(
            projects[1].lifecycle_state,
            LifecycleState::Other("UNKNOWN".into())
        );
    }

    #[test]
    fn raw_asset_parses_search_output() {
        let json = indoc! {r#"
            [
              {"assetType": "storage.googleapis.com/Bucket",
               "createTime": "2025-01-01T00:00:00Z",
               "updateTime": "2025-06-01T12:30:00Z"},
              {"assetType": "pubsub.googleapis.com/Topic"}
            ]
        "#};
        let raw: Vec<RawAsset> = serde_json::from_str(json).unwrap();
        let records: Vec<ResourceRecord> = raw.into_iter().map(ResourceRecord::from).collect();

        assert_eq!(records[0].asset_type, "storage.googleapis.com/Bucket");
        assert_eq!(
            records[0].activity_time(),
            Some("2025-06-01T12:30:00Z".parse().unwrap())
        );
        assert_eq!(records[1].activity_time(), None);
    }

    #[test]
    fn first_line_skips_blank_lines() {
        assert_eq!(first_line("\n\n  ERROR: boom  \nmore"), "ERROR: boom");
        assert_eq!(first_line(""), "unknown error");
    }
}
