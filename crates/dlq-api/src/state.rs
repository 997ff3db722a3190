//! Shared application state threaded through the handlers.

use std::sync::Arc;

use dlq_config::SettingsService;
use dlq_queue::JobService;

/// Static daemon metadata served under `/meta`.
#[derive(Debug, Clone)]
pub struct Meta {
    /// Allowed output roots offered to clients as presets.
    pub out_dir_presets: Vec<String>,
    /// Daemon version string.
    pub version: String,
}

/// Handler state.
#[derive(Clone)]
pub struct ApiState {
    /// Job command facade.
    pub service: Arc<JobService>,
    /// Mutable runtime settings.
    pub settings: Arc<SettingsService>,
    /// Static daemon metadata.
    pub meta: Arc<Meta>,
}

impl ApiState {
    /// Assemble handler state.
    #[must_use]
    pub fn new(service: Arc<JobService>, settings: Arc<SettingsService>, meta: Meta) -> Self {
        Self {
            service,
            settings,
            meta: Arc::new(meta),
        }
    }
}
