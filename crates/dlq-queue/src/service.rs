//! Command facade used by the HTTP surface and CLI.
//!
//! Owns validation and the transitions triggered by external commands
//! (create, retry, remove, pause, resume, clear, purge). Engine progress
//! and time-based transitions belong to the runner.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::SecondsFormat;
use dlq_engine_core::DownloadEngine;
use dlq_resolver::is_webshare_job;
use dlq_store::{Job, JobStatus, NewJob, Store};
use serde::Serialize;
use tracing::info;

use crate::display::{display_status, redact_url};
use crate::error::ServiceError;
use crate::paths::{clean_out_dir, clean_user_filename};

const DEFAULT_MAX_ATTEMPTS: i64 = 5;

/// Request payload for creating a job.
#[derive(Debug, Clone, Default)]
pub struct NewJobRequest {
    /// URL to download.
    pub url: String,
    /// Output directory; must sit under an allowed root.
    pub out_dir: String,
    /// Optional output filename.
    pub name: Option<String>,
    /// Optional explicit site tag.
    pub site: Option<String>,
    /// Optional archive password.
    pub archive_password: Option<String>,
    /// Retry ceiling; falls back to the settings default upstream and to 5
    /// here.
    pub max_attempts: Option<i64>,
}

/// Read model served to the HTTP surface and CLI.
#[derive(Debug, Clone, Serialize)]
pub struct JobView {
    /// Job id.
    pub id: i64,
    /// Original URL.
    pub url: String,
    /// Explicit site tag, empty when auto-detected.
    pub site: String,
    /// Output directory.
    pub out_dir: String,
    /// User-chosen filename, empty when none.
    pub name: String,
    /// Lifecycle status string.
    pub status: String,
    /// Resolved filename.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Resolved size in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<i64>,
    /// Bytes downloaded.
    pub bytes_done: i64,
    /// Download speed in bytes per second.
    pub download_speed: i64,
    /// Estimated seconds remaining.
    pub eta_seconds: i64,
    /// Failure message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Failure code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Creation timestamp, RFC 3339.
    pub created_at: String,
    /// Last update timestamp, RFC 3339.
    pub updated_at: String,
}

impl From<Job> for JobView {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            url: job.url,
            site: job.site.unwrap_or_default(),
            out_dir: job.out_dir,
            name: job.name.unwrap_or_default(),
            status: job.status.as_str().to_string(),
            filename: job.filename,
            size_bytes: job.size_bytes,
            bytes_done: job.bytes_done,
            download_speed: job.download_speed,
            eta_seconds: job.eta_seconds.unwrap_or(0),
            error: job.error,
            error_code: job.error_code,
            created_at: job.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            updated_at: job.updated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

/// The job command facade.
pub struct JobService {
    store: Store,
    engine: Option<Arc<dyn DownloadEngine>>,
    allowed_roots: Vec<PathBuf>,
}

impl JobService {
    /// Build the facade. `engine` may be absent in degraded deployments;
    /// engine-touching actions then fail with a typed sentinel.
    #[must_use]
    pub fn new(
        store: Store,
        engine: Option<Arc<dyn DownloadEngine>>,
        allowed_roots: Vec<PathBuf>,
    ) -> Self {
        Self {
            store,
            engine,
            allowed_roots,
        }
    }

    /// Validate and persist a new job in `queued`.
    pub async fn create_job(&self, request: NewJobRequest) -> Result<i64, ServiceError> {
        if request.url.trim().is_empty() {
            return Err(ServiceError::invalid("missing url"));
        }
        let out_dir = clean_out_dir(&request.out_dir, &self.allowed_roots)?;
        let name = clean_user_filename(request.name.as_deref().unwrap_or(""))?;
        let site = request
            .site
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let archive_password = request
            .archive_password
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);
        let max_attempts = request
            .max_attempts
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_MAX_ATTEMPTS);

        let has_password = archive_password.is_some();
        let new_job = NewJob {
            url: request.url.trim().to_string(),
            out_dir: out_dir.clone(),
            name: name.clone(),
            site: site.clone(),
            archive_password,
            max_attempts,
        };
        let id = self.store.create_job(&new_job).await?;

        let mut message = format!("added url={} out={out_dir}", redact_url(&new_job.url));
        if let Some(name) = &name {
            message.push_str(&format!(" name={name}"));
        }
        if let Some(site) = &site {
            message.push_str(&format!(" site={site}"));
        }
        if has_password {
            message.push_str(" archive_password=***");
        }
        message.push_str(&format!(" max_attempts={max_attempts}"));
        self.event_best_effort(id, "info", &message).await;
        info!(job_id = id, "job created");
        Ok(id)
    }

    /// List jobs as views.
    pub async fn list_jobs(
        &self,
        status: Option<JobStatus>,
        include_deleted: bool,
    ) -> Result<Vec<JobView>, ServiceError> {
        let jobs = self.store.list_jobs(status, include_deleted).await?;
        Ok(jobs.into_iter().map(JobView::from).collect())
    }

    /// Fetch one job as a view.
    pub async fn get_job(&self, id: i64) -> Result<JobView, ServiceError> {
        self.fetch(id).await.map(JobView::from)
    }

    /// Fetch a job's event lines.
    pub async fn list_events(&self, id: i64, limit: i64) -> Result<Vec<String>, ServiceError> {
        Ok(self.store.list_events(id, limit).await?)
    }

    /// Retry a job.
    ///
    /// A `decrypt_failed` job re-enters `decrypting` without touching the
    /// download or the stored `error_code`; anything else tears down the
    /// engine task and requeues from scratch.
    pub async fn retry(&self, id: i64) -> Result<(), ServiceError> {
        let job = self.fetch(id).await?;
        if job.status == JobStatus::DecryptFailed {
            self.store.mark_decrypting_retry(id).await?;
            self.event_best_effort(id, "info", "retry decrypt queued").await;
            return Ok(());
        }
        if let Some(gid) = job.engine_gid.as_deref() {
            self.remove_engine_task(gid).await?;
        }
        self.store.requeue(id).await?;
        self.event_best_effort(id, "info", "retried").await;
        Ok(())
    }

    /// Soft-delete a job, tearing down any live engine task.
    pub async fn remove(&self, id: i64) -> Result<(), ServiceError> {
        let job = self.fetch(id).await?;
        if let Some(gid) = job.engine_gid.as_deref() {
            self.remove_engine_task(gid).await?;
        }
        self.store.remove(id).await?;
        self.event_best_effort(id, "info", "removed").await;
        Ok(())
    }

    /// Clear finished jobs.
    pub async fn clear(&self) -> Result<(), ServiceError> {
        Ok(self.store.clear_completed().await?)
    }

    /// Destroy every job and its events.
    pub async fn purge(&self) -> Result<(), ServiceError> {
        Ok(self.store.clear_all().await?)
    }

    /// Pause a job. Jobs not yet handed to the engine pause directly;
    /// otherwise the engine is asked first and the status only changes on
    /// success.
    pub async fn pause(&self, id: i64) -> Result<(), ServiceError> {
        let job = self.fetch(id).await?;
        let label = display_status(JobStatus::Paused, job.site.as_deref(), &job.url);
        if matches!(job.status, JobStatus::Queued | JobStatus::Resolving) {
            self.store.mark_paused(id).await?;
            self.event_best_effort(id, "info", &label).await;
            return Ok(());
        }
        let engine = self
            .engine
            .as_ref()
            .ok_or(ServiceError::DownloaderNotConfigured)?;
        let gid = job
            .engine_gid
            .as_deref()
            .ok_or(ServiceError::MissingEngineGid)?;
        engine.pause(gid).await.map_err(ServiceError::from_engine)?;
        self.store.mark_paused(id).await?;
        self.event_best_effort(id, "info", &label).await;
        Ok(())
    }

    /// Resume a job. Webshare jobs are requeued because their resolved URL
    /// expires; jobs without a GID are requeued; a lost GID on unpause
    /// falls back to a requeue too.
    pub async fn resume(&self, id: i64) -> Result<(), ServiceError> {
        let job = self.fetch(id).await?;
        if is_webshare_job(job.site.as_deref(), &job.url) {
            if let Some(gid) = job.engine_gid.as_deref() {
                self.remove_engine_task(gid).await?;
            }
            return self.requeue_for_resume(id).await;
        }
        let engine = self
            .engine
            .as_ref()
            .ok_or(ServiceError::DownloaderNotConfigured)?;
        let Some(gid) = job.engine_gid.as_deref() else {
            return self.requeue_for_resume(id).await;
        };
        match engine.unpause(gid).await {
            Ok(()) => {
                self.store.mark_downloading_status(id).await?;
                self.event_best_effort(id, "info", "resumed").await;
                Ok(())
            }
            Err(err) if err.is_gid_not_found() => self.requeue_for_resume(id).await,
            Err(err) => Err(ServiceError::from_engine(err)),
        }
    }

    async fn requeue_for_resume(&self, id: i64) -> Result<(), ServiceError> {
        self.store.requeue(id).await?;
        self.event_best_effort(id, "info", "resume requeued").await;
        Ok(())
    }

    /// Make the GID gone; a GID the engine already forgot counts as done.
    async fn remove_engine_task(&self, gid: &str) -> Result<(), ServiceError> {
        let Some(engine) = self.engine.as_ref() else {
            return Ok(());
        };
        if gid.trim().is_empty() {
            return Ok(());
        }
        match engine.remove(gid).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_gid_not_found() => Ok(()),
            Err(err) => Err(ServiceError::from_engine(err)),
        }
    }

    async fn fetch(&self, id: i64) -> Result<Job, ServiceError> {
        self.store.get_job(id).await?.ok_or(ServiceError::NotFound)
    }

    /// Event appends are bookkeeping; a failure must never fail the
    /// command that triggered it.
    async fn event_best_effort(&self, id: i64, level: &str, message: &str) {
        if let Err(err) = self.store.add_event(id, level, message).await {
            tracing::warn!(job_id = id, error = %err, "failed to append job event");
        }
    }
}
