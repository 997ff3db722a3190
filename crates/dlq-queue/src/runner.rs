//! The polling runner that advances jobs through the state machine.
//!
//! One cooperative loop does all queue work in tick order: refresh active
//! downloads, dispatch pending post-processing, requeue due retryables,
//! then claim new queued jobs up to the configured concurrency. Decrypt
//! work is handed to a bounded worker pool; a pending set keyed by job id
//! prevents double-scheduling while a task is queued or running.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{Duration as Delay, Utc};
use dlq_config::SettingsService;
use dlq_engine_core::{DownloadEngine, EngineOptions, EngineStatus, TransferState};
use dlq_postprocess::{
    ArchiveExtractor, MegaDecryptor, is_archive_file, multipart_group_key,
    resolve_archive_entry_path,
};
use dlq_resolver::{ResolveError, ResolverRegistry, TargetKind, is_mega_job};
use dlq_store::{Job, JobStatus, Store, StoreError};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::paths::sanitize_filename;

/// Runner tuning knobs.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Tick interval of the polling loop.
    pub poll_interval: Duration,
    /// Width of the decrypt worker pool.
    pub decrypt_concurrency: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            decrypt_concurrency: 1,
        }
    }
}

/// The queue orchestrator.
pub struct Runner {
    store: Store,
    resolvers: Arc<ResolverRegistry>,
    engine: Arc<dyn DownloadEngine>,
    settings: Arc<SettingsService>,
    poll_interval: Duration,
    decrypt_width: usize,
    decrypt: Arc<DecryptPool>,
}

/// A unit of post-download work handed to the decrypt pool.
#[derive(Debug, Clone)]
struct DecryptTask {
    job_id: i64,
    mega_path: PathBuf,
    archive_path: PathBuf,
    out_dir: String,
    password: Option<String>,
    raw_url: String,
    site: Option<String>,
    decrypt_mega: bool,
    decrypt_arch: bool,
}

/// What the runner decided about a finished download.
enum DecryptDecision {
    /// No post-processing applies.
    Skip,
    /// Post-processing applies but cannot run (e.g. no file path).
    Fail(String),
    /// Post-processing applies; `wait` holds the multipart hold message.
    Ready {
        task: DecryptTask,
        wait: Option<String>,
    },
}

impl Runner {
    /// Build a runner. Decryptors are attached with the `with_*` builders;
    /// without them the corresponding post-processing step never applies.
    #[must_use]
    pub fn new(
        store: Store,
        resolvers: Arc<ResolverRegistry>,
        engine: Arc<dyn DownloadEngine>,
        settings: Arc<SettingsService>,
        config: RunnerConfig,
    ) -> Self {
        let width = config.decrypt_concurrency.max(1);
        Self {
            decrypt: Arc::new(DecryptPool {
                store: store.clone(),
                mega: None,
                archive: None,
                semaphore: Semaphore::new(width),
                pending: Mutex::new(HashSet::new()),
            }),
            store,
            resolvers,
            engine,
            settings,
            poll_interval: config.poll_interval,
            decrypt_width: width,
        }
    }

    /// Attach the MEGA payload decryptor.
    #[must_use]
    pub fn with_mega_decryptor(self, decryptor: Arc<dyn MegaDecryptor>) -> Self {
        let archive = self.decrypt.archive.clone();
        self.rebuild_pool(Some(decryptor), archive)
    }

    /// Attach the archive extractor.
    #[must_use]
    pub fn with_archive_extractor(self, extractor: Arc<dyn ArchiveExtractor>) -> Self {
        let mega = self.decrypt.mega.clone();
        self.rebuild_pool(mega, Some(extractor))
    }

    /// The pool is only ever replaced before the runner starts, so the
    /// builders swap the whole Arc rather than mutating through it.
    fn rebuild_pool(
        mut self,
        mega: Option<Arc<dyn MegaDecryptor>>,
        archive: Option<Arc<dyn ArchiveExtractor>>,
    ) -> Self {
        self.decrypt = Arc::new(DecryptPool {
            store: self.store.clone(),
            mega,
            archive,
            semaphore: Semaphore::new(self.decrypt_width),
            pending: Mutex::new(HashSet::new()),
        });
        self
    }

    /// Enqueue a decrypt task unless one is already queued or running for
    /// the job.
    fn schedule_decrypt(&self, task: DecryptTask, shutdown: &CancellationToken) {
        if !self.decrypt.mark_pending(task.job_id) {
            return;
        }
        let pool = Arc::clone(&self.decrypt);
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            pool.run(task, shutdown).await;
        });
    }

    /// Run the tick loop until the token fires. Cancellation is observed
    /// at tick boundaries and inside the decrypt pool.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(interval_ms = self.poll_interval.as_millis() as u64, "runner started");
        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("runner stopped");
                    return;
                }
                _ = ticker.tick() => self.tick(&shutdown).await,
            }
        }
    }

    async fn tick(&self, shutdown: &CancellationToken) {
        if let Err(err) = self.update_active(shutdown).await {
            warn!(error = %err, "refreshing active downloads failed");
        }
        if let Err(err) = self.dispatch_pending_postprocess(shutdown).await {
            warn!(error = %err, "post-processing dispatch failed");
        }
        if let Err(err) = self.requeue_failed().await {
            warn!(error = %err, "requeue of retryable jobs failed");
        }
        self.claim_new_work(shutdown).await;
    }

    /// Poll the engine for every job in `downloading` and fold the status
    /// into the store.
    async fn update_active(&self, shutdown: &CancellationToken) -> Result<(), StoreError> {
        let jobs = self
            .store
            .list_jobs(Some(JobStatus::Downloading), false)
            .await?;
        for job in jobs {
            if shutdown.is_cancelled() {
                return Ok(());
            }
            let Some(gid) = job.engine_gid.clone() else {
                continue;
            };
            match self.engine.tell_status(&gid).await {
                Ok(status) => self.apply_engine_status(&job, &status, shutdown).await,
                Err(err) if err.is_gid_not_found() => {
                    let message = err.to_string();
                    self.event(job.id, "error", &message).await;
                    if let Err(mark_err) = self
                        .store
                        .mark_failed(
                            job.id,
                            "gid_not_found",
                            &message,
                            Some(Utc::now() + Delay::minutes(2)),
                        )
                        .await
                    {
                        warn!(job_id = job.id, error = %mark_err, "failed to mark lost gid");
                    }
                }
                Err(err) => {
                    // Transient RPC trouble; keep the job in downloading
                    // and try again next tick.
                    self.event(job.id, "error", &err.to_string()).await;
                }
            }
        }
        Ok(())
    }

    async fn apply_engine_status(
        &self,
        job: &Job,
        status: &EngineStatus,
        shutdown: &CancellationToken,
    ) {
        let mut bytes_done = i64::try_from(status.completed_bytes).unwrap_or(i64::MAX);
        let total = i64::try_from(status.total_bytes).unwrap_or(i64::MAX);
        let speed = i64::try_from(status.download_speed).unwrap_or(i64::MAX);
        let eta = if speed > 0 && total > 0 && bytes_done < total {
            (total - bytes_done) / speed
        } else {
            0
        };

        match status.state {
            TransferState::Complete => {
                if bytes_done == 0 && total > 0 {
                    bytes_done = total;
                }
                if self
                    .queue_decrypt_from_status(job, status, bytes_done, shutdown)
                    .await
                {
                    return;
                }
                if let Err(err) = self
                    .store
                    .update_progress(job.id, bytes_done, JobStatus::Completed, 0, None)
                    .await
                {
                    warn!(job_id = job.id, error = %err, "failed to write final progress");
                }
                self.event(job.id, "info", "download finished").await;
                if let Err(err) = self.store.mark_completed(job.id).await {
                    warn!(job_id = job.id, error = %err, "failed to mark job completed");
                }
            }
            TransferState::Error => {
                let message = status
                    .error_message
                    .clone()
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| "download error".to_string());
                let (code, delay) = classify_download_error(&message);
                self.event(job.id, "error", &message).await;
                if let Err(err) = self
                    .store
                    .mark_failed(job.id, code, &message, Some(Utc::now() + delay))
                    .await
                {
                    warn!(job_id = job.id, error = %err, "failed to mark download error");
                }
            }
            _ => {
                if let Err(err) = self
                    .store
                    .update_progress(job.id, bytes_done, JobStatus::Downloading, speed, Some(eta))
                    .await
                {
                    warn!(job_id = job.id, error = %err, "failed to write progress");
                }
            }
        }
    }

    /// Inline post-processing entry from a `complete` engine status.
    /// Returns true when the completion was fully handled here.
    async fn queue_decrypt_from_status(
        &self,
        job: &Job,
        status: &EngineStatus,
        bytes_done: i64,
        shutdown: &CancellationToken,
    ) -> bool {
        match self.build_decrypt_task(job, Some(status)).await {
            DecryptDecision::Skip => false,
            DecryptDecision::Fail(message) => {
                self.event(job.id, "error", &message).await;
                self.fail_postprocess(job.id, &message, "postprocess_failed")
                    .await;
                true
            }
            DecryptDecision::Ready { task, wait } => {
                if let Err(err) = self.store.mark_decrypting(job.id, bytes_done).await {
                    warn!(job_id = job.id, error = %err, "failed to mark decrypting");
                    return false;
                }
                self.event(job.id, "info", "download finished").await;
                if let Some(wait) = wait {
                    self.event(job.id, "info", &wait).await;
                    return true;
                }
                self.schedule_decrypt(task, shutdown);
                true
            }
        }
    }

    /// Catch-up scan: jobs whose download ended without a scheduled
    /// decrypt (daemon restart, multipart holds) are re-evaluated every
    /// tick.
    async fn dispatch_pending_postprocess(
        &self,
        shutdown: &CancellationToken,
    ) -> Result<(), StoreError> {
        if self.decrypt.mega.is_none() && self.decrypt.archive.is_none() {
            return Ok(());
        }
        let jobs = self.store.list_pending_postprocess(100).await?;
        for job in jobs {
            if shutdown.is_cancelled() {
                return Ok(());
            }
            match self.build_decrypt_task(&job, None).await {
                DecryptDecision::Skip => {
                    // Nothing applies; finish the job and retire it from
                    // the scan.
                    if let Err(err) = self.store.mark_completed(job.id).await {
                        warn!(job_id = job.id, error = %err, "failed to complete job");
                        continue;
                    }
                    self.clear_password(job.id).await;
                }
                DecryptDecision::Fail(message) => {
                    self.event(job.id, "error", &message).await;
                    self.fail_postprocess(job.id, &message, "postprocess_failed")
                        .await;
                }
                DecryptDecision::Ready { task, wait } => {
                    let mut newly_marked = false;
                    if job.status != JobStatus::Decrypting {
                        if let Err(err) =
                            self.store.mark_decrypting(job.id, job.bytes_done).await
                        {
                            warn!(job_id = job.id, error = %err, "failed to mark decrypting");
                            continue;
                        }
                        newly_marked = true;
                    }
                    if let Some(wait) = wait {
                        // Re-announcing the hold every tick would flood the
                        // event log.
                        if newly_marked {
                            self.event(job.id, "info", &wait).await;
                        }
                        continue;
                    }
                    self.schedule_decrypt(task, shutdown);
                }
            }
        }
        Ok(())
    }

    async fn build_decrypt_task(&self, job: &Job, status: Option<&EngineStatus>) -> DecryptDecision {
        let password = job
            .archive_password
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);
        let download_path = status
            .and_then(EngineStatus::first_file_path)
            .map(PathBuf::from)
            .or_else(|| archive_path_for_job(job))
            .unwrap_or_default();
        let archive_path = if download_path.as_os_str().is_empty() {
            PathBuf::new()
        } else {
            resolve_archive_entry_path(&download_path)
        };

        let task = DecryptTask {
            job_id: job.id,
            decrypt_mega: self.should_decrypt_mega(job, &download_path),
            decrypt_arch: self.should_decrypt_archive(job, &archive_path, password.as_deref()),
            mega_path: download_path,
            archive_path,
            out_dir: job.out_dir.clone(),
            password,
            raw_url: job.url.clone(),
            site: job.site.clone(),
        };
        if !task.decrypt_mega && !task.decrypt_arch {
            return DecryptDecision::Skip;
        }
        if task.decrypt_mega && task.mega_path.as_os_str().is_empty() {
            return DecryptDecision::Fail(
                "postprocess failed: missing file path for mega decrypt".to_string(),
            );
        }
        if task.decrypt_arch && task.archive_path.as_os_str().is_empty() {
            return DecryptDecision::Fail(
                "postprocess failed: missing file path for archive decrypt".to_string(),
            );
        }
        let wait = if task.decrypt_arch {
            self.archive_wait_message(job, &task.archive_path).await
        } else {
            None
        };
        DecryptDecision::Ready { task, wait }
    }

    /// MEGA payload decrypt applies to MEGA jobs, except on retry of an
    /// archive-only failure: the payload was already decrypted, and
    /// re-running CTR over plaintext corrupts it and then fails the MAC.
    fn should_decrypt_mega(&self, job: &Job, file_path: &Path) -> bool {
        if self.decrypt.mega.is_none() {
            return false;
        }
        if !is_mega_job(job.site.as_deref(), &job.url) {
            return false;
        }
        if job.status == JobStatus::Decrypting
            && is_archive_file(file_path)
            && job
                .error_code
                .as_deref()
                .is_some_and(|code| !code.trim().is_empty())
        {
            return false;
        }
        true
    }

    /// Archive extraction applies to archives when auto-decrypt is on; an
    /// explicit password makes it mandatory regardless of the setting.
    /// Jobs already in `decrypting` were queued under an earlier decision
    /// and finish regardless of the current setting.
    fn should_decrypt_archive(&self, job: &Job, file_path: &Path, password: Option<&str>) -> bool {
        if self.decrypt.archive.is_none() {
            return false;
        }
        if job.status == JobStatus::Decrypting {
            return password.is_some() || is_archive_file(file_path);
        }
        if password.is_some() {
            return true;
        }
        self.settings.auto_decrypt() && is_archive_file(file_path)
    }

    /// Hold extraction while sibling volumes of the same multipart set in
    /// the same `out_dir` are still on their way.
    async fn archive_wait_message(&self, job: &Job, file_path: &Path) -> Option<String> {
        let (group_key, mut group_explicit) = multipart_group_key(file_path)?;
        let jobs = match self.store.list_jobs(None, false).await {
            Ok(jobs) => jobs,
            Err(err) => {
                warn!(job_id = job.id, error = %err, "multipart sibling scan failed");
                return None;
            }
        };
        let mut pending_parts = 0;
        let mut seen_sibling = false;
        for other in &jobs {
            if other.id == job.id || other.out_dir != job.out_dir {
                continue;
            }
            let Some(other_path) = archive_path_for_job(other) else {
                continue;
            };
            let Some((other_key, other_explicit)) = multipart_group_key(&other_path) else {
                continue;
            };
            if other_key != group_key {
                continue;
            }
            seen_sibling = true;
            if other_explicit {
                group_explicit = true;
            }
            if matches!(
                other.status,
                JobStatus::Queued | JobStatus::Resolving | JobStatus::Downloading | JobStatus::Paused
            ) {
                pending_parts += 1;
            }
        }
        if !group_explicit && !seen_sibling {
            return None;
        }
        (pending_parts > 0).then(|| {
            format!(
                "archive decrypt waiting: multipart set still downloading ({pending_parts} part job(s))"
            )
        })
    }

    async fn requeue_failed(&self) -> Result<(), StoreError> {
        let ids = self.store.list_retryable_failed(0).await?;
        for id in ids {
            match self.store.requeue(id).await {
                Ok(()) => self.event(id, "info", "auto retry queued").await,
                Err(err) => {
                    self.event(id, "error", &format!("auto requeue failed: {err}"))
                        .await;
                }
            }
        }
        Ok(())
    }

    /// Claim queued jobs while the downloading count is below the
    /// concurrency setting, driving each through resolving into the
    /// engine.
    async fn claim_new_work(&self, shutdown: &CancellationToken) {
        loop {
            if shutdown.is_cancelled() {
                return;
            }
            let active = match self.store.count_jobs(JobStatus::Downloading).await {
                Ok(count) => count,
                Err(err) => {
                    warn!(error = %err, "counting active downloads failed");
                    return;
                }
            };
            if active >= i64::try_from(self.settings.concurrency()).unwrap_or(i64::MAX) {
                return;
            }
            match self.store.claim_next_queued().await {
                Ok(Some(job)) => {
                    if let Err(err) = self.resolve_and_start(&job).await {
                        warn!(job_id = job.id, error = %err, "resolve/start failed");
                    }
                }
                Ok(None) => return,
                Err(err) => {
                    warn!(error = %err, "claiming next queued job failed");
                    return;
                }
            }
        }
    }

    async fn resolve_and_start(&self, claimed: &Job) -> Result<(), StoreError> {
        // The claim raced against remove; a soft-deleted job must not
        // start even though it was claimed.
        let job = match self.store.get_job(claimed.id).await? {
            Some(latest) if latest.is_deleted() => {
                self.event(claimed.id, "info", "skipped deleted job").await;
                return Ok(());
            }
            Some(latest) => latest,
            None => claimed.clone(),
        };

        let target = match self
            .resolvers
            .resolve_with_site(job.site.as_deref(), &job.url)
            .await
        {
            Ok(target) => target,
            Err(err) => {
                let (code, message, delay) = classify_resolver_error(&err);
                self.event(job.id, "error", &message).await;
                return self
                    .store
                    .mark_failed(job.id, code, &message, Some(Utc::now() + delay))
                    .await;
            }
        };

        let filename = target.filename.as_deref().and_then(sanitize_filename);
        self.store
            .update_resolving(job.id, &target.url, filename.as_deref(), target.size_bytes)
            .await?;

        match target.kind {
            TargetKind::Aria2 => {}
            _ => {
                let message = "resolver returned unsupported engine";
                self.event(job.id, "error", message).await;
                return self
                    .store
                    .mark_failed(
                        job.id,
                        "unsupported_engine",
                        message,
                        Some(Utc::now() + Delay::minutes(30)),
                    )
                    .await;
            }
        }

        let mut options = EngineOptions::new();
        options.insert("dir", job.out_dir.as_str());
        let user_name = job.name.as_deref().and_then(sanitize_filename);
        if let Some(out) = user_name.or_else(|| filename.clone()) {
            options.insert("out", out);
        }
        for (key, value) in &target.options {
            if value.is_empty() {
                continue;
            }
            options.insert(key.as_str(), value.as_str());
        }

        if let Some(out_name) = options.get("out").and_then(sanitize_filename) {
            if let Err(err) = self.prepare_output_for_start(&job, &out_name, &options).await {
                let message = format!("prepare output failed: {err}");
                self.event(job.id, "error", &message).await;
                return self
                    .store
                    .mark_failed(
                        job.id,
                        "prepare_output_failed",
                        &err.to_string(),
                        Some(Utc::now() + Delay::minutes(10)),
                    )
                    .await;
            }
        }

        if !target.headers.is_empty() {
            let header = target
                .headers
                .iter()
                .map(|(key, value)| format!("{key}: {value}"))
                .collect::<Vec<_>>()
                .join("\n");
            options.insert("header", header);
        }

        match self.engine.add_uri(&target.url, &options).await {
            Ok(gid) => {
                self.event(job.id, "info", "download started").await;
                self.store.mark_downloading(job.id, "aria2", &gid).await
            }
            Err(err) => {
                let message = err.to_string();
                self.event(job.id, "error", &message).await;
                self.store
                    .mark_failed(
                        job.id,
                        "download_start_failed",
                        &message,
                        Some(Utc::now() + Delay::minutes(10)),
                    )
                    .await
            }
        }
    }

    /// When the resolver forces a fresh start, drop a stale engine control
    /// file, unless a sibling job still writing the same output needs it.
    async fn prepare_output_for_start(
        &self,
        job: &Job,
        out_name: &str,
        options: &EngineOptions,
    ) -> std::io::Result<()> {
        if !needs_fresh_start(options) {
            return Ok(());
        }
        if self.has_active_output_conflict(job, out_name).await {
            return Ok(());
        }
        let control_path = Path::new(&job.out_dir).join(format!("{out_name}.aria2"));
        match tokio::fs::remove_file(&control_path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Scan non-deleted jobs sharing `out_dir`: an active sibling that
    /// would write the same output filename still owns the control state.
    async fn has_active_output_conflict(&self, job: &Job, out_name: &str) -> bool {
        let jobs = match self.store.list_jobs(None, false).await {
            Ok(jobs) => jobs,
            Err(err) => {
                warn!(job_id = job.id, error = %err, "output conflict scan failed");
                return false;
            }
        };
        jobs.iter().any(|other| {
            other.id != job.id
                && other.out_dir == job.out_dir
                && matches!(
                    other.status,
                    JobStatus::Queued
                        | JobStatus::Resolving
                        | JobStatus::Downloading
                        | JobStatus::Paused
                        | JobStatus::Decrypting
                )
                && output_name_for_job(other).as_deref() == Some(out_name)
        })
    }

    async fn fail_postprocess(&self, job_id: i64, message: &str, code: &str) {
        if let Err(err) = self.store.mark_postprocess_failed(job_id, message, code).await {
            warn!(job_id, error = %err, "failed to mark postprocess failure");
        }
        self.clear_password(job_id).await;
    }

    async fn clear_password(&self, job_id: i64) {
        if let Err(err) = self.store.clear_archive_password(job_id).await {
            warn!(job_id, error = %err, "failed to clear archive password");
        }
    }

    async fn event(&self, job_id: i64, level: &str, message: &str) {
        if let Err(err) = self.store.add_event(job_id, level, message).await {
            warn!(job_id, error = %err, "failed to append job event");
        }
    }
}

/// Shared state of the decrypt worker pool.
struct DecryptPool {
    store: Store,
    mega: Option<Arc<dyn MegaDecryptor>>,
    archive: Option<Arc<dyn ArchiveExtractor>>,
    semaphore: Semaphore,
    pending: Mutex<HashSet<i64>>,
}

impl DecryptPool {
    async fn run(&self, task: DecryptTask, shutdown: CancellationToken) {
        let permit = tokio::select! {
            () = shutdown.cancelled() => {
                self.unmark_pending(task.job_id);
                return;
            }
            permit = self.semaphore.acquire() => match permit {
                Ok(permit) => permit,
                Err(_) => {
                    self.unmark_pending(task.job_id);
                    return;
                }
            },
        };
        self.execute(&task).await;
        drop(permit);
        self.unmark_pending(task.job_id);
    }

    async fn execute(&self, task: &DecryptTask) {
        if task.decrypt_mega {
            if let Some(mega) = &self.mega {
                let base = file_base(&task.mega_path);
                self.event(task.job_id, "info", &format!("mega decrypt started: {base}"))
                    .await;
                match mega
                    .maybe_decrypt(task.site.as_deref(), &task.raw_url, &task.mega_path)
                    .await
                {
                    Ok(true) => {
                        self.event(task.job_id, "info", &format!("mega decrypted: {base}"))
                            .await;
                    }
                    Ok(false) => {}
                    Err(err) => {
                        self.event(
                            task.job_id,
                            "error",
                            &format!("mega decrypt failed: {err}"),
                        )
                        .await;
                        self.fail(task.job_id, "mega decrypt failed", "mega_decrypt_failed")
                            .await;
                        return;
                    }
                }
            }
        }
        if task.decrypt_arch {
            if let Some(archive) = &self.archive {
                let base = file_base(&task.archive_path);
                self.event(
                    task.job_id,
                    "info",
                    &format!("archive decrypt started: {base}"),
                )
                .await;
                match archive
                    .maybe_extract(
                        &task.archive_path,
                        Path::new(&task.out_dir),
                        task.password.as_deref(),
                    )
                    .await
                {
                    Ok(true) => {
                        self.event(task.job_id, "info", &format!("archive decrypted: {base}"))
                            .await;
                    }
                    Ok(false) => {
                        self.event(task.job_id, "info", "archive decrypt skipped: not an archive")
                            .await;
                    }
                    Err(err) => {
                        self.event(
                            task.job_id,
                            "error",
                            &format!("archive decrypt failed: {err}"),
                        )
                        .await;
                        self.fail(task.job_id, "archive decrypt failed", "archive_decrypt_failed")
                            .await;
                        return;
                    }
                }
            }
        }
        if let Err(err) = self.store.mark_completed(task.job_id).await {
            warn!(job_id = task.job_id, error = %err, "failed to mark job completed");
        }
        if let Err(err) = self.store.clear_archive_password(task.job_id).await {
            warn!(job_id = task.job_id, error = %err, "failed to clear archive password");
        }
    }

    async fn fail(&self, job_id: i64, message: &str, code: &str) {
        if let Err(err) = self.store.mark_postprocess_failed(job_id, message, code).await {
            warn!(job_id, error = %err, "failed to mark postprocess failure");
        }
        if let Err(err) = self.store.clear_archive_password(job_id).await {
            warn!(job_id, error = %err, "failed to clear archive password");
        }
    }

    async fn event(&self, job_id: i64, level: &str, message: &str) {
        if let Err(err) = self.store.add_event(job_id, level, message).await {
            warn!(job_id, error = %err, "failed to append job event");
        }
    }

    fn mark_pending(&self, job_id: i64) -> bool {
        let mut pending = self
            .pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        pending.insert(job_id)
    }

    fn unmark_pending(&self, job_id: i64) {
        let mut pending = self
            .pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        pending.remove(&job_id);
    }
}

fn file_base(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Filesystem path the finished download should live at, from the user
/// name or the resolved filename.
fn archive_path_for_job(job: &Job) -> Option<PathBuf> {
    let name = job
        .name
        .as_deref()
        .and_then(sanitize_filename)
        .or_else(|| job.filename.as_deref().and_then(sanitize_filename))?;
    Some(Path::new(&job.out_dir).join(name))
}

fn output_name_for_job(job: &Job) -> Option<String> {
    job.name
        .as_deref()
        .and_then(sanitize_filename)
        .or_else(|| job.filename.as_deref().and_then(sanitize_filename))
}

/// A fresh start is forced when the resolver disabled resume support.
fn needs_fresh_start(options: &EngineOptions) -> bool {
    ["continue", "always-resume"].iter().any(|key| {
        options
            .get(key)
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("false"))
    })
}

fn classify_resolver_error(err: &ResolveError) -> (&'static str, String, Delay) {
    match err {
        ResolveError::LoginRequired => (
            "login_required",
            "login required or file not public".to_string(),
            Delay::hours(6),
        ),
        ResolveError::QuotaExceeded => (
            "quota_exceeded",
            "quota exceeded; retry later".to_string(),
            Delay::hours(2),
        ),
        ResolveError::CaptchaNeeded => (
            "captcha_needed",
            "captcha required; cannot proceed in headless mode".to_string(),
            Delay::hours(24),
        ),
        ResolveError::TemporarilyUnavailable => (
            "temporarily_unavailable",
            "temporarily unavailable; retry later".to_string(),
            Delay::minutes(30),
        ),
        ResolveError::UnknownSite => (
            "unknown_site",
            "unknown site; cannot resolve".to_string(),
            Delay::hours(6),
        ),
        other => ("resolve_failed", other.to_string(), Delay::minutes(30)),
    }
}

fn classify_download_error(message: &str) -> (&'static str, Delay) {
    let lower = message.trim().to_lowercase();
    if ["status=509", "status code 509", "status 509"]
        .iter()
        .any(|marker| lower.contains(marker))
    {
        ("quota_exceeded", Delay::hours(2))
    } else {
        ("download_error", Delay::minutes(10))
    }
}
