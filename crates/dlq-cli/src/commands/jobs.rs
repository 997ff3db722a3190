//! Job listing, logs, and per-job actions.

use std::time::Duration;

use anyhow::Result;
use serde_json::{Value, json};

use crate::cli::{LogsArgs, StatusArgs};
use crate::client::{ApiClient, JobView};
use crate::output;

const ACTIVE_STATUSES: [&str; 4] = ["queued", "resolving", "downloading", "decrypting"];

pub(crate) async fn status(client: &ApiClient, args: StatusArgs) -> Result<()> {
    loop {
        let path = match args.status.as_deref().filter(|s| !s.is_empty()) {
            Some(status) => format!("/jobs?status={status}"),
            None => "/jobs".to_string(),
        };
        let jobs: Vec<JobView> = client.get_json(&path).await?;
        output::print_jobs(&jobs);
        if !args.watch || !has_active_jobs(&jobs) {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_secs(args.interval.max(1))).await;
        println!();
    }
}

fn has_active_jobs(jobs: &[JobView]) -> bool {
    jobs.iter()
        .any(|job| ACTIVE_STATUSES.contains(&job.status.as_str()))
}

pub(crate) async fn files(client: &ApiClient) -> Result<()> {
    let jobs: Vec<JobView> = client.get_json("/jobs").await?;
    if jobs.is_empty() {
        println!("no jobs");
        return Ok(());
    }
    for job in &jobs {
        let name = output::display_name(job);
        println!("{:<5} {}/{name}", job.id, job.out_dir.trim_end_matches('/'));
    }
    Ok(())
}

pub(crate) async fn logs(client: &ApiClient, args: LogsArgs) -> Result<()> {
    let path = match args.tail {
        Some(limit) if limit > 0 => format!("/jobs/{}/events?limit={limit}", args.id),
        _ => format!("/jobs/{}/events", args.id),
    };
    let lines: Vec<String> = client.get_json(&path).await?;
    // The daemon serves newest first; read top-down like a log file.
    for line in lines.iter().rev() {
        println!("{line}");
    }
    Ok(())
}

pub(crate) async fn action(client: &ApiClient, id: i64, action: &str) -> Result<()> {
    client
        .post_json::<Value>(&format!("/jobs/{id}/{action}"), &json!({}))
        .await?;
    println!("{action} ok: job {id}");
    Ok(())
}

pub(crate) async fn clear(client: &ApiClient) -> Result<()> {
    client.post_json::<Value>("/jobs/clear", &json!({})).await?;
    println!("cleared finished jobs");
    Ok(())
}

pub(crate) async fn purge(client: &ApiClient) -> Result<()> {
    client.post_json::<Value>("/jobs/purge", &json!({})).await?;
    println!("purged all jobs");
    Ok(())
}
