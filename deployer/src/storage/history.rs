//! Deployment attempt history
//!
//! One JSON document per site holding the most recent attempts,
//! newest first. The store keeps entries verbatim and makes no
//! judgement about their content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DeployerError;
use crate::filesys::file::File;

/// Maximum number of attempts retained per site
pub const MAX_ENTRIES: usize = 10;

/// Outcome of a deploy attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptStatus {
    Success,
    Error,
}

/// One complete run of the deploy pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployAttempt {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub status: AttemptStatus,
    pub message: String,
    pub logs: Vec<String>,
}

/// Read the attempt history, newest first. A missing document reads empty.
pub async fn read(file: &File) -> Result<Vec<DeployAttempt>, DeployerError> {
    if !file.exists().await {
        return Ok(Vec::new());
    }
    file.read_json().await
}

/// Prepend `entry` and truncate to `max` entries, silently evicting the
/// oldest. Returns the stored sequence.
pub async fn append(
    file: &File,
    entry: DeployAttempt,
    max: usize,
) -> Result<Vec<DeployAttempt>, DeployerError> {
    let mut entries = read(file).await?;
    entries.insert(0, entry);
    entries.truncate(max);
    file.write_json(&entries).await?;
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesys::dir::Dir;

    fn attempt(id: &str) -> DeployAttempt {
        let now = Utc::now();
        DeployAttempt {
            id: id.to_string(),
            started_at: now,
            finished_at: now,
            duration_ms: 0,
            status: AttemptStatus::Success,
            message: "ok".to_string(),
            logs: vec![],
        }
    }

    #[tokio::test]
    async fn test_read_missing_history_is_empty() {
        let dir = Dir::create_temp_dir("deployer-history-test").await.unwrap();
        let entries = read(&dir.file("deploy-log.json")).await.unwrap();
        assert!(entries.is_empty());
        dir.delete().await.unwrap();
    }

    #[tokio::test]
    async fn test_append_keeps_newest_first() {
        let dir = Dir::create_temp_dir("deployer-history-test").await.unwrap();
        let file = dir.file("deploy-log.json");

        append(&file, attempt("first"), MAX_ENTRIES).await.unwrap();
        append(&file, attempt("second"), MAX_ENTRIES).await.unwrap();

        let entries = read(&file).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "second");
        assert_eq!(entries[1].id, "first");

        dir.delete().await.unwrap();
    }

    #[tokio::test]
    async fn test_append_evicts_beyond_max() {
        let dir = Dir::create_temp_dir("deployer-history-test").await.unwrap();
        let file = dir.file("deploy-log.json");

        for i in 0..=MAX_ENTRIES {
            append(&file, attempt(&format!("attempt-{}", i)), MAX_ENTRIES)
                .await
                .unwrap();
        }

        let entries = read(&file).await.unwrap();
        assert_eq!(entries.len(), MAX_ENTRIES);
        // Newest first; the very first attempt has been evicted.
        assert_eq!(entries[0].id, format!("attempt-{}", MAX_ENTRIES));
        assert_eq!(entries[MAX_ENTRIES - 1].id, "attempt-1");

        dir.delete().await.unwrap();
    }
}
