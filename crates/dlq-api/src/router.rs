//! Router construction and server host.

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::state::ApiState;
use crate::{browse, jobs, meta, settings};

/// Request bodies above this size are rejected with 413.
const MAX_BODY_BYTES: usize = 1 << 20;

/// Build the control-surface router.
#[must_use]
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/meta", get(meta::show))
        .route("/jobs", get(jobs::list).post(jobs::create))
        .route("/jobs/clear", post(jobs::clear))
        .route("/jobs/purge", post(jobs::purge))
        .route("/jobs/{id}", get(jobs::show))
        .route("/jobs/{id}/events", get(jobs::events))
        .route("/jobs/{id}/retry", post(jobs::retry))
        .route("/jobs/{id}/remove", post(jobs::remove))
        .route("/jobs/{id}/pause", post(jobs::pause))
        .route("/jobs/{id}/resume", post(jobs::resume))
        .route("/api/settings", get(settings::show).post(settings::update))
        .route("/api/browse", get(browse::list))
        .route("/api/browse/mkdir", post(browse::mkdir))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the router until the shutdown token fires.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}
