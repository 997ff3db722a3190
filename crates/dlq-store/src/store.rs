//! SQLite store implementation.
//!
//! Timestamps are stored as second-precision UTC RFC 3339 text so that
//! lexical comparison in SQL (`next_retry_at <= ?`) matches chronological
//! order. Events cascade with their job via the foreign key.

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};

use crate::error::StoreError;
use crate::job::{Job, JobStatus};

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS jobs (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  url TEXT NOT NULL,
  site TEXT,
  out_dir TEXT NOT NULL,
  name TEXT,
  resolved_url TEXT,
  filename TEXT,
  size_bytes INTEGER,
  bytes_done INTEGER NOT NULL DEFAULT 0,
  download_speed INTEGER NOT NULL DEFAULT 0,
  eta_seconds INTEGER,
  status TEXT NOT NULL,
  error TEXT,
  error_code TEXT,
  engine TEXT NOT NULL DEFAULT 'aria2',
  engine_gid TEXT,
  attempts INTEGER NOT NULL DEFAULT 0,
  max_attempts INTEGER NOT NULL DEFAULT 5,
  next_retry_at TEXT,
  archive_password TEXT,
  created_at TEXT NOT NULL,
  updated_at TEXT NOT NULL,
  started_at TEXT,
  completed_at TEXT,
  deleted_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
CREATE INDEX IF NOT EXISTS idx_jobs_retry ON jobs(next_retry_at);

CREATE TABLE IF NOT EXISTS job_events (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  job_id INTEGER NOT NULL,
  level TEXT NOT NULL,
  message TEXT NOT NULL,
  created_at TEXT NOT NULL,
  FOREIGN KEY(job_id) REFERENCES jobs(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_job_events_job_id ON job_events(job_id);
";

const JOB_COLUMNS: &str = "id, url, site, out_dir, name, resolved_url, filename, size_bytes, \
     bytes_done, download_speed, eta_seconds, status, error, error_code, engine, engine_gid, \
     attempts, max_attempts, next_retry_at, archive_password, created_at, updated_at, \
     started_at, completed_at, deleted_at";

/// Fields required to create a job.
#[derive(Debug, Clone)]
pub struct NewJob {
    /// User-supplied URL.
    pub url: String,
    /// Validated output directory.
    pub out_dir: String,
    /// Optional validated output filename.
    pub name: Option<String>,
    /// Optional explicit site tag.
    pub site: Option<String>,
    /// Optional archive password.
    pub archive_password: Option<String>,
    /// Automatic retry ceiling.
    pub max_attempts: i64,
}

/// Handle to the SQLite-backed job store.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

fn fmt_ts(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_ts(id: i64, column: &'static str, value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|_| StoreError::MalformedTimestamp { id, column })
}

fn parse_ts_opt(
    id: i64,
    column: &'static str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, StoreError> {
    value
        .as_deref()
        .map(|raw| parse_ts(id, column, raw))
        .transpose()
}

fn job_from_row(row: &SqliteRow) -> Result<Job, StoreError> {
    let id: i64 = row.try_get("id").map_err(StoreError::query("read job row"))?;
    let status_raw: String = row
        .try_get("status")
        .map_err(StoreError::query("read job row"))?;
    let status =
        JobStatus::parse(&status_raw).ok_or_else(|| StoreError::UnknownStatus {
            id,
            status: status_raw,
        })?;

    let get_text = |column: &str| -> Result<Option<String>, StoreError> {
        row.try_get(column)
            .map_err(StoreError::query("read job row"))
    };

    Ok(Job {
        id,
        url: row.try_get("url").map_err(StoreError::query("read job row"))?,
        site: get_text("site")?.filter(|s| !s.is_empty()),
        out_dir: row
            .try_get("out_dir")
            .map_err(StoreError::query("read job row"))?,
        name: get_text("name")?.filter(|s| !s.is_empty()),
        resolved_url: get_text("resolved_url")?,
        filename: get_text("filename")?,
        size_bytes: row
            .try_get("size_bytes")
            .map_err(StoreError::query("read job row"))?,
        bytes_done: row
            .try_get("bytes_done")
            .map_err(StoreError::query("read job row"))?,
        download_speed: row
            .try_get("download_speed")
            .map_err(StoreError::query("read job row"))?,
        eta_seconds: row
            .try_get("eta_seconds")
            .map_err(StoreError::query("read job row"))?,
        status,
        error: get_text("error")?,
        error_code: get_text("error_code")?,
        engine: row
            .try_get("engine")
            .map_err(StoreError::query("read job row"))?,
        engine_gid: get_text("engine_gid")?,
        attempts: row
            .try_get("attempts")
            .map_err(StoreError::query("read job row"))?,
        max_attempts: row
            .try_get("max_attempts")
            .map_err(StoreError::query("read job row"))?,
        next_retry_at: parse_ts_opt(id, "next_retry_at", get_text("next_retry_at")?)?,
        archive_password: get_text("archive_password")?,
        created_at: {
            let raw: String = row
                .try_get("created_at")
                .map_err(StoreError::query("read job row"))?;
            parse_ts(id, "created_at", &raw)?
        },
        updated_at: {
            let raw: String = row
                .try_get("updated_at")
                .map_err(StoreError::query("read job row"))?;
            parse_ts(id, "updated_at", &raw)?
        },
        started_at: parse_ts_opt(id, "started_at", get_text("started_at")?)?,
        completed_at: parse_ts_opt(id, "completed_at", get_text("completed_at")?)?,
        deleted_at: parse_ts_opt(id, "deleted_at", get_text("deleted_at")?)?,
    })
}

impl Store {
    /// Open (or create) the database at `path` and bootstrap the schema.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);
        Self::open_with(options, 5).await
    }

    /// Open an in-memory database. Used by tests and tooling; a single
    /// connection, because every SQLite in-memory connection is its own
    /// database.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|source| StoreError::Open { source })?
            .foreign_keys(true);
        Self::open_with(options, 1).await
    }

    async fn open_with(
        options: SqliteConnectOptions,
        max_connections: u32,
    ) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|source| StoreError::Open { source })?;
        sqlx::raw_sql(SCHEMA)
            .execute(&pool)
            .await
            .map_err(|source| StoreError::Open { source })?;
        Ok(Self { pool })
    }

    /// Insert a new job in `queued` and return its id.
    pub async fn create_job(&self, new: &NewJob) -> Result<i64, StoreError> {
        let now = fmt_ts(Utc::now());
        let result = sqlx::query(
            "INSERT INTO jobs (url, site, out_dir, name, archive_password, status, created_at, \
             updated_at, max_attempts) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&new.url)
        .bind(new.site.as_deref())
        .bind(&new.out_dir)
        .bind(new.name.as_deref())
        .bind(new.archive_password.as_deref())
        .bind(JobStatus::Queued.as_str())
        .bind(&now)
        .bind(&now)
        .bind(new.max_attempts)
        .execute(&self.pool)
        .await
        .map_err(StoreError::query("create job"))?;
        Ok(result.last_insert_rowid())
    }

    /// Fetch one job by id.
    pub async fn get_job(&self, id: i64) -> Result<Option<Job>, StoreError> {
        let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::query("get job"))?;
        row.as_ref().map(job_from_row).transpose()
    }

    /// List jobs, newest first, optionally filtered by status; soft-deleted
    /// rows are excluded unless requested.
    pub async fn list_jobs(
        &self,
        status: Option<JobStatus>,
        include_deleted: bool,
    ) -> Result<Vec<Job>, StoreError> {
        let mut sql = format!("SELECT {JOB_COLUMNS} FROM jobs");
        let mut clauses = Vec::new();
        if !include_deleted {
            clauses.push("deleted_at IS NULL");
        }
        if status.is_some() {
            clauses.push("status = ?");
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY id DESC");

        let mut query = sqlx::query(&sql);
        if let Some(status) = status {
            query = query.bind(status.as_str());
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::query("list jobs"))?;
        rows.iter().map(job_from_row).collect()
    }

    /// Count non-deleted jobs in a given status.
    pub async fn count_jobs(&self, status: JobStatus) -> Result<i64, StoreError> {
        let row =
            sqlx::query("SELECT COUNT(*) AS n FROM jobs WHERE status = ? AND deleted_at IS NULL")
                .bind(status.as_str())
                .fetch_one(&self.pool)
                .await
                .map_err(StoreError::query("count jobs"))?;
        row.try_get("n").map_err(StoreError::query("count jobs"))
    }

    /// Append an audit event for a job.
    pub async fn add_event(&self, job_id: i64, level: &str, message: &str) -> Result<(), StoreError> {
        let now = fmt_ts(Utc::now());
        sqlx::query("INSERT INTO job_events (job_id, level, message, created_at) VALUES (?, ?, ?, ?)")
            .bind(job_id)
            .bind(level)
            .bind(message)
            .bind(&now)
            .execute(&self.pool)
            .await
            .map_err(StoreError::query("add event"))?;
        Ok(())
    }

    /// List a job's events as preformatted lines, newest first.
    pub async fn list_events(&self, job_id: i64, limit: i64) -> Result<Vec<String>, StoreError> {
        let mut sql = String::from(
            "SELECT created_at || ' ' || level || ' ' || message AS line FROM job_events \
             WHERE job_id = ? ORDER BY id DESC",
        );
        if limit > 0 {
            sql.push_str(" LIMIT ?");
        }
        let mut query = sqlx::query(&sql).bind(job_id);
        if limit > 0 {
            query = query.bind(limit);
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::query("list events"))?;
        rows.iter()
            .map(|row| row.try_get("line").map_err(StoreError::query("list events")))
            .collect()
    }

    /// Atomically claim the next runnable queued job: the lowest-id queued,
    /// non-deleted row whose retry time (if any) has passed flips to
    /// `resolving`. A single UPDATE keeps concurrent callers from claiming
    /// the same row.
    pub async fn claim_next_queued(&self) -> Result<Option<Job>, StoreError> {
        let now = fmt_ts(Utc::now());
        let sql = format!(
            "UPDATE jobs SET status = ?, updated_at = ?, started_at = ? \
             WHERE id = (SELECT id FROM jobs WHERE status = ? AND deleted_at IS NULL \
             AND (next_retry_at IS NULL OR next_retry_at <= ?) ORDER BY id ASC LIMIT 1) \
             RETURNING {JOB_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(JobStatus::Resolving.as_str())
            .bind(&now)
            .bind(&now)
            .bind(JobStatus::Queued.as_str())
            .bind(&now)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::query("claim next queued"))?;
        row.as_ref().map(job_from_row).transpose()
    }

    /// Record resolver output on the claimed job.
    pub async fn update_resolving(
        &self,
        id: i64,
        resolved_url: &str,
        filename: Option<&str>,
        size_bytes: Option<i64>,
    ) -> Result<(), StoreError> {
        let now = fmt_ts(Utc::now());
        sqlx::query(
            "UPDATE jobs SET resolved_url = ?, filename = ?, size_bytes = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(resolved_url)
        .bind(filename)
        .bind(size_bytes)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::query("update resolving"))?;
        Ok(())
    }

    /// Bind the job to a live engine task and enter `downloading`.
    pub async fn mark_downloading(&self, id: i64, engine: &str, gid: &str) -> Result<(), StoreError> {
        let now = fmt_ts(Utc::now());
        sqlx::query(
            "UPDATE jobs SET status = ?, engine = ?, engine_gid = ?, updated_at = ? WHERE id = ?",
        )
        .bind(JobStatus::Downloading.as_str())
        .bind(engine)
        .bind(gid)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::query("mark downloading"))?;
        Ok(())
    }

    /// Flip to `paused`.
    pub async fn mark_paused(&self, id: i64) -> Result<(), StoreError> {
        self.set_status(id, JobStatus::Paused, "mark paused").await
    }

    /// Flip back to `downloading` (resume of an existing engine task).
    pub async fn mark_downloading_status(&self, id: i64) -> Result<(), StoreError> {
        self.set_status(id, JobStatus::Downloading, "mark downloading status")
            .await
    }

    async fn set_status(
        &self,
        id: i64,
        status: JobStatus,
        operation: &'static str,
    ) -> Result<(), StoreError> {
        let now = fmt_ts(Utc::now());
        sqlx::query("UPDATE jobs SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::query(operation))?;
        Ok(())
    }

    /// Write a progress snapshot.
    pub async fn update_progress(
        &self,
        id: i64,
        bytes_done: i64,
        status: JobStatus,
        speed: i64,
        eta_seconds: Option<i64>,
    ) -> Result<(), StoreError> {
        let now = fmt_ts(Utc::now());
        sqlx::query(
            "UPDATE jobs SET bytes_done = ?, status = ?, download_speed = ?, eta_seconds = ?, \
             updated_at = ? WHERE id = ?",
        )
        .bind(bytes_done)
        .bind(status.as_str())
        .bind(speed)
        .bind(eta_seconds)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::query("update progress"))?;
        Ok(())
    }

    /// Terminal success: stamp `completed_at`, zero the speed, and promote
    /// `bytes_done` to the resolved size when the engine never reported
    /// byte-level progress.
    pub async fn mark_completed(&self, id: i64) -> Result<(), StoreError> {
        let now = fmt_ts(Utc::now());
        sqlx::query(
            "UPDATE jobs SET status = ?, \
             bytes_done = CASE WHEN bytes_done = 0 AND size_bytes IS NOT NULL AND size_bytes > 0 \
             THEN size_bytes ELSE bytes_done END, \
             download_speed = 0, eta_seconds = NULL, updated_at = ?, completed_at = ? \
             WHERE id = ?",
        )
        .bind(JobStatus::Completed.as_str())
        .bind(&now)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::query("mark completed"))?;
        Ok(())
    }

    /// Record a failure: store code and message, bump `attempts`, and set
    /// the auto-retry horizon. When the bump reaches `max_attempts` an
    /// audit event is appended.
    pub async fn mark_failed(
        &self,
        id: i64,
        code: &str,
        message: &str,
        next_retry_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let now = fmt_ts(Utc::now());
        let retry = next_retry_at.map(fmt_ts);
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(StoreError::query("mark failed"))?;
        sqlx::query(
            "UPDATE jobs SET status = ?, error = ?, error_code = ?, download_speed = 0, \
             eta_seconds = NULL, updated_at = ?, next_retry_at = ?, attempts = attempts + 1 \
             WHERE id = ?",
        )
        .bind(JobStatus::Failed.as_str())
        .bind(message)
        .bind(code)
        .bind(&now)
        .bind(retry.as_deref())
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::query("mark failed"))?;

        let row = sqlx::query("SELECT attempts, max_attempts FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(StoreError::query("mark failed"))?;
        if let Some(row) = row {
            let attempts: i64 = row
                .try_get("attempts")
                .map_err(StoreError::query("mark failed"))?;
            let max_attempts: i64 = row
                .try_get("max_attempts")
                .map_err(StoreError::query("mark failed"))?;
            if attempts >= max_attempts {
                sqlx::query(
                    "INSERT INTO job_events (job_id, level, message, created_at) \
                     VALUES (?, 'error', 'max attempts reached', ?)",
                )
                .bind(id)
                .bind(&now)
                .execute(&mut *tx)
                .await
                .map_err(StoreError::query("mark failed"))?;
            }
        }
        tx.commit().await.map_err(StoreError::query("mark failed"))?;
        Ok(())
    }

    /// Enter `decrypting` with the final byte count of the download.
    pub async fn mark_decrypting(&self, id: i64, bytes_done: i64) -> Result<(), StoreError> {
        let now = fmt_ts(Utc::now());
        sqlx::query(
            "UPDATE jobs SET status = ?, bytes_done = ?, download_speed = 0, eta_seconds = NULL, \
             updated_at = ? WHERE id = ?",
        )
        .bind(JobStatus::Decrypting.as_str())
        .bind(bytes_done)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::query("mark decrypting"))?;
        Ok(())
    }

    /// Re-enter `decrypting` after a decrypt failure: keeps `bytes_done` and
    /// (deliberately) `error_code`, which the runner reads to pick the
    /// post-processing substep on retry.
    pub async fn mark_decrypting_retry(&self, id: i64) -> Result<(), StoreError> {
        self.set_status(id, JobStatus::Decrypting, "mark decrypting retry")
            .await
    }

    /// Terminal post-processing failure; manual retry only.
    pub async fn mark_postprocess_failed(
        &self,
        id: i64,
        message: &str,
        code: &str,
    ) -> Result<(), StoreError> {
        let now = fmt_ts(Utc::now());
        sqlx::query(
            "UPDATE jobs SET status = ?, error = ?, error_code = ?, updated_at = ? WHERE id = ?",
        )
        .bind(JobStatus::DecryptFailed.as_str())
        .bind(message)
        .bind(code)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::query("mark postprocess failed"))?;
        Ok(())
    }

    /// Reset a job back to `queued`, clearing resolved state, progress,
    /// engine binding, errors, and the soft-delete marker.
    pub async fn requeue(&self, id: i64) -> Result<(), StoreError> {
        let now = fmt_ts(Utc::now());
        sqlx::query(
            "UPDATE jobs SET status = ?, error = NULL, error_code = NULL, next_retry_at = NULL, \
             deleted_at = NULL, resolved_url = NULL, filename = NULL, size_bytes = NULL, \
             bytes_done = 0, download_speed = 0, eta_seconds = NULL, engine = 'aria2', \
             engine_gid = NULL, started_at = NULL, completed_at = NULL, updated_at = ? \
             WHERE id = ?",
        )
        .bind(JobStatus::Queued.as_str())
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::query("requeue"))?;
        Ok(())
    }

    /// Soft delete: the row survives for audit until purged.
    pub async fn remove(&self, id: i64) -> Result<(), StoreError> {
        let now = fmt_ts(Utc::now());
        sqlx::query("UPDATE jobs SET status = ?, deleted_at = ?, updated_at = ? WHERE id = ?")
            .bind(JobStatus::Deleted.as_str())
            .bind(&now)
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::query("remove"))?;
        Ok(())
    }

    /// Drop the archive password once it is no longer needed.
    pub async fn clear_archive_password(&self, id: i64) -> Result<(), StoreError> {
        let now = fmt_ts(Utc::now());
        sqlx::query("UPDATE jobs SET archive_password = NULL, updated_at = ? WHERE id = ?")
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::query("clear archive password"))?;
        Ok(())
    }

    /// Hard-delete finished rows: completed jobs and soft-deleted jobs,
    /// events cascading.
    pub async fn clear_completed(&self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM jobs WHERE status = ? OR deleted_at IS NOT NULL")
            .bind(JobStatus::Completed.as_str())
            .execute(&self.pool)
            .await
            .map_err(StoreError::query("clear completed"))?;
        Ok(())
    }

    /// Purge everything, including the id sequence.
    pub async fn clear_all(&self) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(StoreError::query("clear all"))?;
        sqlx::query("DELETE FROM job_events")
            .execute(&mut *tx)
            .await
            .map_err(StoreError::query("clear all"))?;
        sqlx::query("DELETE FROM jobs")
            .execute(&mut *tx)
            .await
            .map_err(StoreError::query("clear all"))?;
        sqlx::query(
            "DELETE FROM sqlite_sequence WHERE name IN ('jobs', 'job_events') \
             AND EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' \
             AND name = 'sqlite_sequence')",
        )
        .execute(&mut *tx)
        .await
        .map_err(StoreError::query("clear all"))?;
        tx.commit().await.map_err(StoreError::query("clear all"))?;
        Ok(())
    }

    /// Ids of failed jobs whose retry horizon has passed and which still
    /// have attempts left.
    pub async fn list_retryable_failed(&self, limit: i64) -> Result<Vec<i64>, StoreError> {
        let now = fmt_ts(Utc::now());
        let mut sql = String::from(
            "SELECT id FROM jobs WHERE status = ? AND deleted_at IS NULL \
             AND attempts < max_attempts AND next_retry_at IS NOT NULL AND next_retry_at <= ? \
             ORDER BY id ASC",
        );
        if limit > 0 {
            sql.push_str(" LIMIT ?");
        }
        let mut query = sqlx::query(&sql).bind(JobStatus::Failed.as_str()).bind(&now);
        if limit > 0 {
            query = query.bind(limit);
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::query("list retryable failed"))?;
        rows.iter()
            .map(|row| {
                row.try_get("id")
                    .map_err(StoreError::query("list retryable failed"))
            })
            .collect()
    }

    /// Jobs whose download ended but whose post-processing outcome is still
    /// open: everything in `decrypting`, plus `completed` rows not yet
    /// stamped with `completed_at` (interrupted between the progress write
    /// and the terminal stamp).
    pub async fn list_pending_postprocess(&self, limit: i64) -> Result<Vec<Job>, StoreError> {
        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE deleted_at IS NULL AND \
             (status = ? OR (status = ? AND completed_at IS NULL)) ORDER BY id ASC LIMIT ?"
        );
        let rows = sqlx::query(&sql)
            .bind(JobStatus::Decrypting.as_str())
            .bind(JobStatus::Completed.as_str())
            .bind(if limit > 0 { limit } else { 100 })
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::query("list pending postprocess"))?;
        rows.iter().map(job_from_row).collect()
    }
}
