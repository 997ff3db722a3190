//! Store behaviour tests against an in-memory database.

use chrono::{Duration, Utc};

use crate::job::JobStatus;
use crate::store::{NewJob, Store};

fn sample_job(url: &str) -> NewJob {
    NewJob {
        url: url.to_string(),
        out_dir: "/data".to_string(),
        name: None,
        site: None,
        archive_password: None,
        max_attempts: 5,
    }
}

#[tokio::test]
async fn create_and_get_round_trip() {
    let store = Store::open_in_memory().await.expect("store");
    let id = store
        .create_job(&sample_job("https://example.com/a"))
        .await
        .expect("create");
    let job = store.get_job(id).await.expect("get").expect("exists");
    assert_eq!(job.id, id);
    assert_eq!(job.url, "https://example.com/a");
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.attempts, 0);
    assert_eq!(job.max_attempts, 5);
    assert!(job.engine_gid.is_none());
    assert!(store.get_job(id + 100).await.expect("get").is_none());
}

#[tokio::test]
async fn claim_takes_lowest_id_and_flips_to_resolving() {
    let store = Store::open_in_memory().await.expect("store");
    let first = store
        .create_job(&sample_job("https://example.com/1"))
        .await
        .expect("create");
    let second = store
        .create_job(&sample_job("https://example.com/2"))
        .await
        .expect("create");

    let claimed = store.claim_next_queued().await.expect("claim").expect("job");
    assert_eq!(claimed.id, first);
    assert_eq!(claimed.status, JobStatus::Resolving);
    assert!(claimed.started_at.is_some());

    let claimed = store.claim_next_queued().await.expect("claim").expect("job");
    assert_eq!(claimed.id, second);

    assert!(store.claim_next_queued().await.expect("claim").is_none());
}

#[tokio::test]
async fn claim_skips_deleted_and_unripe_retries() {
    let store = Store::open_in_memory().await.expect("store");
    let deleted = store
        .create_job(&sample_job("https://example.com/deleted"))
        .await
        .expect("create");
    store.remove(deleted).await.expect("remove");

    let failed = store
        .create_job(&sample_job("https://example.com/failed"))
        .await
        .expect("create");
    store
        .mark_failed(
            failed,
            "download_error",
            "boom",
            Some(Utc::now() + Duration::hours(1)),
        )
        .await
        .expect("fail");

    let ready = store
        .create_job(&sample_job("https://example.com/ready"))
        .await
        .expect("create");

    let claimed = store.claim_next_queued().await.expect("claim").expect("job");
    assert_eq!(claimed.id, ready, "deleted and failed rows are skipped");
    assert!(store.claim_next_queued().await.expect("claim").is_none());
}

#[tokio::test]
async fn concurrent_claims_never_return_the_same_id() {
    let store = Store::open_in_memory().await.expect("store");
    for i in 0..4 {
        store
            .create_job(&sample_job(&format!("https://example.com/{i}")))
            .await
            .expect("create");
    }
    let (a, b) = tokio::join!(store.claim_next_queued(), store.claim_next_queued());
    let a = a.expect("claim").expect("job");
    let b = b.expect("claim").expect("job");
    assert_ne!(a.id, b.id);
}

#[tokio::test]
async fn mark_failed_bumps_attempts_and_records_exhaustion() {
    let store = Store::open_in_memory().await.expect("store");
    let mut new = sample_job("https://example.com/f");
    new.max_attempts = 2;
    let id = store.create_job(&new).await.expect("create");

    store
        .mark_failed(id, "download_error", "first", Some(Utc::now()))
        .await
        .expect("fail");
    let job = store.get_job(id).await.expect("get").expect("job");
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempts, 1);
    assert_eq!(job.error_code.as_deref(), Some("download_error"));
    let events = store.list_events(id, 0).await.expect("events");
    assert!(!events.iter().any(|line| line.contains("max attempts reached")));

    store
        .mark_failed(id, "download_error", "second", Some(Utc::now()))
        .await
        .expect("fail");
    let job = store.get_job(id).await.expect("get").expect("job");
    assert_eq!(job.attempts, 2);
    let events = store.list_events(id, 0).await.expect("events");
    assert!(events.iter().any(|line| line.contains("max attempts reached")));
}

#[tokio::test]
async fn retryable_listing_honours_horizon_and_attempts() {
    let store = Store::open_in_memory().await.expect("store");
    let due = store
        .create_job(&sample_job("https://example.com/due"))
        .await
        .expect("create");
    store
        .mark_failed(due, "download_error", "x", Some(Utc::now() - Duration::minutes(1)))
        .await
        .expect("fail");

    let later = store
        .create_job(&sample_job("https://example.com/later"))
        .await
        .expect("create");
    store
        .mark_failed(later, "download_error", "x", Some(Utc::now() + Duration::hours(1)))
        .await
        .expect("fail");

    let mut exhausted_new = sample_job("https://example.com/exhausted");
    exhausted_new.max_attempts = 1;
    let exhausted = store.create_job(&exhausted_new).await.expect("create");
    store
        .mark_failed(
            exhausted,
            "download_error",
            "x",
            Some(Utc::now() - Duration::minutes(1)),
        )
        .await
        .expect("fail");

    let ids = store.list_retryable_failed(0).await.expect("list");
    assert_eq!(ids, vec![due]);
}

#[tokio::test]
async fn requeue_resets_resolved_state_and_progress() {
    let store = Store::open_in_memory().await.expect("store");
    let id = store
        .create_job(&sample_job("https://example.com/r"))
        .await
        .expect("create");
    store.claim_next_queued().await.expect("claim");
    store
        .update_resolving(id, "https://cdn.example.com/r", Some("r.bin"), Some(100))
        .await
        .expect("resolving");
    store
        .mark_downloading(id, "aria2", "gid-9")
        .await
        .expect("downloading");
    store
        .update_progress(id, 40, JobStatus::Downloading, 10, Some(6))
        .await
        .expect("progress");

    store.requeue(id).await.expect("requeue");
    let job = store.get_job(id).await.expect("get").expect("job");
    assert_eq!(job.status, JobStatus::Queued);
    assert!(job.resolved_url.is_none());
    assert!(job.filename.is_none());
    assert!(job.size_bytes.is_none());
    assert_eq!(job.bytes_done, 0);
    assert_eq!(job.download_speed, 0);
    assert!(job.eta_seconds.is_none());
    assert!(job.engine_gid.is_none(), "requeue clears the engine binding");
    assert!(job.started_at.is_none());
    assert!(job.next_retry_at.is_none());
    assert!(job.error.is_none());
    assert!(job.error_code.is_none());
}

#[tokio::test]
async fn soft_delete_hides_from_default_listing() {
    let store = Store::open_in_memory().await.expect("store");
    let id = store
        .create_job(&sample_job("https://example.com/d"))
        .await
        .expect("create");
    store.remove(id).await.expect("remove");

    let job = store.get_job(id).await.expect("get").expect("job");
    assert_eq!(job.status, JobStatus::Deleted);
    assert!(job.deleted_at.is_some());

    let visible = store.list_jobs(None, false).await.expect("list");
    assert!(visible.is_empty());
    let all = store.list_jobs(None, true).await.expect("list");
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn mark_completed_promotes_zero_bytes_to_size() {
    let store = Store::open_in_memory().await.expect("store");
    let id = store
        .create_job(&sample_job("https://example.com/c"))
        .await
        .expect("create");
    store
        .update_resolving(id, "https://cdn.example.com/c", Some("c.bin"), Some(512))
        .await
        .expect("resolving");
    store.mark_completed(id).await.expect("completed");
    let job = store.get_job(id).await.expect("get").expect("job");
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.bytes_done, 512);
    assert!(job.completed_at.is_some());
}

#[tokio::test]
async fn decrypting_retry_preserves_error_code() {
    let store = Store::open_in_memory().await.expect("store");
    let id = store
        .create_job(&sample_job("https://example.com/p"))
        .await
        .expect("create");
    store.mark_decrypting(id, 77).await.expect("decrypting");
    store
        .mark_postprocess_failed(id, "archive decrypt failed", "archive_decrypt_failed")
        .await
        .expect("failed");
    store.mark_decrypting_retry(id).await.expect("retry");

    let job = store.get_job(id).await.expect("get").expect("job");
    assert_eq!(job.status, JobStatus::Decrypting);
    assert_eq!(job.bytes_done, 77);
    assert_eq!(
        job.error_code.as_deref(),
        Some("archive_decrypt_failed"),
        "the runner needs the code to pick the retry substep"
    );
}

#[tokio::test]
async fn pending_postprocess_scan_retires_stamped_rows() {
    let store = Store::open_in_memory().await.expect("store");
    let decrypting = store
        .create_job(&sample_job("https://example.com/x"))
        .await
        .expect("create");
    store.mark_decrypting(decrypting, 10).await.expect("decrypting");

    let stamped = store
        .create_job(&sample_job("https://example.com/y"))
        .await
        .expect("create");
    store.mark_completed(stamped).await.expect("completed");

    let pending = store.list_pending_postprocess(0).await.expect("list");
    let ids: Vec<i64> = pending.iter().map(|job| job.id).collect();
    assert_eq!(ids, vec![decrypting]);
}

#[tokio::test]
async fn purge_resets_ids_and_cascades_events() {
    let store = Store::open_in_memory().await.expect("store");
    let id = store
        .create_job(&sample_job("https://example.com/z"))
        .await
        .expect("create");
    store.add_event(id, "info", "added").await.expect("event");
    store.clear_all().await.expect("purge");

    assert!(store.list_jobs(None, true).await.expect("list").is_empty());
    let fresh = store
        .create_job(&sample_job("https://example.com/fresh"))
        .await
        .expect("create");
    assert_eq!(fresh, 1, "purge resets the id sequence");
    assert!(store.list_events(id, 0).await.expect("events").is_empty());
}

#[tokio::test]
async fn clear_archive_password_drops_the_secret() {
    let store = Store::open_in_memory().await.expect("store");
    let mut new = sample_job("https://example.com/s");
    new.archive_password = Some("hunter2".to_string());
    let id = store.create_job(&new).await.expect("create");
    let job = store.get_job(id).await.expect("get").expect("job");
    assert_eq!(job.archive_password.as_deref(), Some("hunter2"));

    store.clear_archive_password(id).await.expect("clear");
    let job = store.get_job(id).await.expect("get").expect("job");
    assert!(job.archive_password.is_none());
}
