//! Assembles the daemon: store, engine client, resolvers, settings,
//! runner, and the HTTP surface, then serves until ctrl-c.

use std::sync::Arc;

use anyhow::{Context, Result};
use dlq_api::{ApiState, Meta};
use dlq_aria2::Aria2Client;
use dlq_config::{DaemonConfig, SettingsService};
use dlq_engine_core::DownloadEngine;
use dlq_postprocess::{CommandArchiveExtractor, MegaContentDecryptor};
use dlq_queue::{JobService, Runner, RunnerConfig};
use dlq_resolver::{HttpResolver, MegaResolver, ResolverRegistry, WebshareResolver};
use dlq_store::Store;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::logging;

fn version() -> &'static str {
    option_env!("CARGO_PKG_VERSION").unwrap_or("dev")
}

/// Build the resolver registry with the built-in site adapters.
fn build_resolvers() -> ResolverRegistry {
    let webshare = Arc::new(WebshareResolver::new());
    let mega = Arc::new(MegaResolver::new());
    let http = Arc::new(HttpResolver::new());

    let mut registry = ResolverRegistry::new();
    registry.register(webshare.clone());
    registry.register(mega.clone());
    registry.register(http.clone());
    registry.register_site("webshare", webshare);
    registry.register_site("mega", mega);
    registry.register_site("http", http.clone());
    registry.register_site("https", http);
    registry
}

/// Run the daemon until ctrl-c.
pub async fn run_app() -> Result<()> {
    logging::init();
    let config = DaemonConfig::from_env();
    info!(version = version(), "dlqd starting");
    if config.allowed_roots.is_empty() {
        warn!("no DATA_* mounts configured; every job creation will be rejected");
    }

    tokio::fs::create_dir_all(&config.state_dir)
        .await
        .with_context(|| format!("creating state dir {}", config.state_dir.display()))?;
    let store = Store::open(&config.db_path)
        .await
        .with_context(|| format!("opening job database {}", config.db_path.display()))?;
    let settings = Arc::new(
        SettingsService::load_or_default(&config.state_dir).context("loading settings")?,
    );

    let engine: Arc<dyn DownloadEngine> = Arc::new(
        Aria2Client::new(config.aria2_rpc.clone(), config.aria2_secret.clone())
            .context("building aria2 client")?,
    );
    let resolvers = Arc::new(build_resolvers());

    let service = Arc::new(JobService::new(
        store.clone(),
        Some(engine.clone()),
        config.allowed_roots.clone(),
    ));
    let runner = Runner::new(
        store,
        resolvers,
        engine,
        settings.clone(),
        RunnerConfig::default(),
    )
    .with_mega_decryptor(Arc::new(MegaContentDecryptor::new()))
    .with_archive_extractor(Arc::new(CommandArchiveExtractor::new()));

    let shutdown = CancellationToken::new();
    let runner_handle = tokio::spawn(runner.run(shutdown.clone()));

    let meta = Meta {
        out_dir_presets: config
            .allowed_roots
            .iter()
            .map(|root| root.to_string_lossy().into_owned())
            .collect(),
        version: version().to_string(),
    };
    let router = dlq_api::router(ApiState::new(service, settings, meta));
    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    info!(addr = %config.listen_addr, "dlqd listening");

    let server_shutdown = shutdown.clone();
    let ctrlc_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            ctrlc_shutdown.cancel();
        }
    });

    let serve_result = dlq_api::serve(listener, router, server_shutdown).await;
    // Serving ended (signal or bind-level failure); stop the runner too.
    shutdown.cancel();
    if let Err(err) = runner_handle.await {
        warn!(error = %err, "runner task ended abnormally");
    }
    serve_result.context("http server failed")?;
    info!("dlqd stopped");
    Ok(())
}
