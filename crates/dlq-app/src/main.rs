#![forbid(unsafe_code)]

//! `dlqd`, the download queue daemon.

use dlq_app::run_app;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    run_app().await
}
