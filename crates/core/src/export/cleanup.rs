//! Deletion of the previous run's output directory, applied at the start of
//! the next run according to the configured policy.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// When to delete the previous run's output directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupPolicy {
    /// Output directories accumulate indefinitely.
    #[default]
    Never,
    /// Delete the previous run's output before every new run.
    BeforeRunAlways,
    /// Delete the previous run's output only if that run succeeded.
    BeforeRunIfPreviousSucceeded,
}

/// Applies the cleanup policy against the previous run's output directory.
///
/// A missing directory is not an error. The previous run is identified by the
/// bookkeeping the engine keeps across runs; when no run has completed yet
/// there is nothing to clean.
pub async fn apply_cleanup(
    output_root: &Path,
    policy: CleanupPolicy,
    last_run_id: Option<&str>,
    last_run_succeeded: bool,
) -> std::io::Result<()> {
    let last_run_id = match last_run_id {
        Some(id) if !id.is_empty() => id,
        _ => return Ok(()),
    };
    match policy {
        CleanupPolicy::Never => return Ok(()),
        CleanupPolicy::BeforeRunIfPreviousSucceeded if !last_run_succeeded => {
            debug!(
                last_run_id,
                "skipping output cleanup, previous run did not succeed"
            );
            return Ok(());
        }
        _ => {}
    }

    let path = output_root.join(last_run_id);
    if !path.exists() {
        return Ok(());
    }
    info!(path = %path.display(), "removing previous run output");
    tokio::fs::remove_dir_all(&path).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn seed_run_dir(root: &Path, run_id: &str) {
        let dir = root.join(run_id).join("group").join("script");
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("part-0001.txt"), b"data")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_never_policy_keeps_output() {
        let tmp = TempDir::new().unwrap();
        seed_run_dir(tmp.path(), "run-1").await;

        apply_cleanup(tmp.path(), CleanupPolicy::Never, Some("run-1"), true)
            .await
            .unwrap();

        assert!(tmp.path().join("run-1").exists());
    }

    #[tokio::test]
    async fn test_always_policy_removes_previous_run() {
        let tmp = TempDir::new().unwrap();
        seed_run_dir(tmp.path(), "run-1").await;
        seed_run_dir(tmp.path(), "run-2").await;

        apply_cleanup(tmp.path(), CleanupPolicy::BeforeRunAlways, Some("run-1"), false)
            .await
            .unwrap();

        assert!(!tmp.path().join("run-1").exists());
        assert!(tmp.path().join("run-2").exists());
    }

    #[tokio::test]
    async fn test_conditional_policy_respects_previous_outcome() {
        let tmp = TempDir::new().unwrap();
        seed_run_dir(tmp.path(), "run-1").await;

        apply_cleanup(
            tmp.path(),
            CleanupPolicy::BeforeRunIfPreviousSucceeded,
            Some("run-1"),
            false,
        )
        .await
        .unwrap();
        assert!(tmp.path().join("run-1").exists());

        apply_cleanup(
            tmp.path(),
            CleanupPolicy::BeforeRunIfPreviousSucceeded,
            Some("run-1"),
            true,
        )
        .await
        .unwrap();
        assert!(!tmp.path().join("run-1").exists());
    }

    #[tokio::test]
    async fn test_no_previous_run_is_noop() {
        let tmp = TempDir::new().unwrap();
        apply_cleanup(tmp.path(), CleanupPolicy::BeforeRunAlways, None, false)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_directory_is_not_an_error() {
        let tmp = TempDir::new().unwrap();
        apply_cleanup(tmp.path(), CleanupPolicy::BeforeRunAlways, Some("gone"), true)
            .await
            .unwrap();
    }
}
