//! The engine trait implemented by concrete adapters.

use async_trait::async_trait;

use crate::error::EngineError;
use crate::model::{EngineOptions, EngineStatus};

/// Narrow contract the orchestrator requires from an external download
/// engine. Five operations, nothing engine-specific leaks through.
#[async_trait]
pub trait DownloadEngine: Send + Sync {
    /// Hand a URI to the engine and return its opaque GID.
    async fn add_uri(&self, uri: &str, options: &EngineOptions) -> Result<String, EngineError>;

    /// Fetch the current status of a transfer.
    ///
    /// Returns [`EngineError::GidNotFound`] when the engine lost the GID.
    async fn tell_status(&self, gid: &str) -> Result<EngineStatus, EngineError>;

    /// Pause a transfer.
    async fn pause(&self, gid: &str) -> Result<(), EngineError>;

    /// Resume a paused transfer.
    async fn unpause(&self, gid: &str) -> Result<(), EngineError>;

    /// Make the GID gone, whatever state it is in. Implementations must be
    /// idempotent; callers treat [`EngineError::GidNotFound`] as success.
    async fn remove(&self, gid: &str) -> Result<(), EngineError>;
}
