//! The durable job entity and its lifecycle states.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting to be claimed by the runner.
    Queued,
    /// Claimed; the resolver is producing a concrete target.
    Resolving,
    /// Handed to the engine; a GID is live.
    Downloading,
    /// Explicitly paused.
    Paused,
    /// Download finished; post-processing pending or running.
    Decrypting,
    /// Terminal success.
    Completed,
    /// Failed; may auto-requeue when `next_retry_at` passes.
    Failed,
    /// Post-processing failed terminally; manual retry only.
    DecryptFailed,
    /// Soft-deleted; kept for audit until purged.
    Deleted,
}

impl JobStatus {
    /// Canonical column/string form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Resolving => "resolving",
            Self::Downloading => "downloading",
            Self::Paused => "paused",
            Self::Decrypting => "decrypting",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::DecryptFailed => "decrypt_failed",
            Self::Deleted => "deleted",
        }
    }

    /// Parse the column form back into a status.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "queued" => Self::Queued,
            "resolving" => Self::Resolving,
            "downloading" => Self::Downloading,
            "paused" => Self::Paused,
            "decrypting" => Self::Decrypting,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "decrypt_failed" => Self::DecryptFailed,
            "deleted" => Self::Deleted,
            _ => return None,
        })
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One user request for one URL; the durable unit of work.
#[derive(Debug, Clone)]
pub struct Job {
    /// Monotonic primary key.
    pub id: i64,
    /// User-supplied URL, immutable.
    pub url: String,
    /// Optional explicit site tag.
    pub site: Option<String>,
    /// Validated absolute output directory.
    pub out_dir: String,
    /// Optional user-chosen output filename.
    pub name: Option<String>,
    /// Concrete URL produced by the resolver.
    pub resolved_url: Option<String>,
    /// Filename reported by the resolver (sanitized).
    pub filename: Option<String>,
    /// Size reported by the resolver.
    pub size_bytes: Option<i64>,
    /// Progress snapshot: bytes downloaded.
    pub bytes_done: i64,
    /// Progress snapshot: bytes per second.
    pub download_speed: i64,
    /// Progress snapshot: seconds remaining, when computable.
    pub eta_seconds: Option<i64>,
    /// Lifecycle state.
    pub status: JobStatus,
    /// Failure message; set only in failed states.
    pub error: Option<String>,
    /// Failure code from the shared taxonomy.
    pub error_code: Option<String>,
    /// Engine name the job is bound to.
    pub engine: String,
    /// Live engine handle, present only while an engine task exists.
    pub engine_gid: Option<String>,
    /// Failure count so far.
    pub attempts: i64,
    /// Automatic retry ceiling.
    pub max_attempts: i64,
    /// Earliest time a failed job may auto-requeue.
    pub next_retry_at: Option<DateTime<Utc>>,
    /// Optional per-job archive password; cleared on terminal outcomes.
    pub archive_password: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
    /// First claim time.
    pub started_at: Option<DateTime<Utc>>,
    /// Terminal success time.
    pub completed_at: Option<DateTime<Utc>>,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Whether the row is soft-deleted.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            JobStatus::Queued,
            JobStatus::Resolving,
            JobStatus::Downloading,
            JobStatus::Paused,
            JobStatus::Decrypting,
            JobStatus::Completed,
            JobStatus::Failed,
            JobStatus::DecryptFailed,
            JobStatus::Deleted,
        ] {
            assert_eq!(JobStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(JobStatus::parse("bogus"), None);
    }
}
