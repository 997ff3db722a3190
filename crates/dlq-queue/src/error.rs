//! Service-level error taxonomy.
//!
//! The HTTP surface maps these onto status codes: `ActionNotAllowed` and
//! `MissingEngineGid` → 409, `DownloaderNotConfigured` → 503, `NotFound`
//! → 404, `Invalid` → 400.

use dlq_engine_core::EngineError;
use dlq_store::StoreError;
use thiserror::Error;

/// Errors surfaced by the job command facade.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The engine refused the action in the job's current state.
    #[error("action_not_allowed: {0}")]
    ActionNotAllowed(String),
    /// The action needs a live engine task but the job has no GID.
    #[error("missing_engine_gid")]
    MissingEngineGid,
    /// No download engine is wired into the daemon.
    #[error("downloader_not_configured")]
    DownloaderNotConfigured,
    /// The job id does not exist.
    #[error("job not found")]
    NotFound,
    /// Request validation failed.
    #[error("{0}")]
    Invalid(String),
    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The engine failed in a way that is not an action precondition.
    #[error("engine failure")]
    Engine(#[source] EngineError),
}

impl ServiceError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }

    /// Map an engine error from a command path: illegal transitions become
    /// the 409 sentinel, everything else is wrapped.
    pub(crate) fn from_engine(err: EngineError) -> Self {
        if err.is_action_not_allowed() {
            Self::ActionNotAllowed(err.to_string())
        } else {
            Self::Engine(err)
        }
    }
}
