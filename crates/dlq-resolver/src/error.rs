//! Resolver error taxonomy.
//!
//! The orchestrator maps each variant onto a job `error_code` and a retry
//! backoff; keep variants aligned with that table.

use thiserror::Error;

use crate::link::MegaLinkError;

/// Errors a resolver can report while turning a URL into a target.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The provider requires an authenticated session or the file is not
    /// public.
    #[error("login required or file not public")]
    LoginRequired,
    /// The provider's download quota is exhausted.
    #[error("quota exceeded; retry later")]
    QuotaExceeded,
    /// The provider demands a captcha the daemon cannot answer.
    #[error("captcha required; cannot proceed in headless mode")]
    CaptchaNeeded,
    /// The provider is temporarily refusing service.
    #[error("temporarily unavailable; retry later")]
    TemporarilyUnavailable,
    /// An explicit site tag names no registered resolver.
    #[error("unknown site; cannot resolve")]
    UnknownSite,
    /// No registered resolver accepts the URL.
    #[error("no resolver accepts this url")]
    NoResolver,
    /// Anything else: transport failures, malformed provider payloads, bad
    /// links.
    #[error("resolve failed: {message}")]
    Failed {
        /// Human-readable failure description.
        message: String,
    },
}

impl ResolveError {
    /// Catch-all constructor for provider and transport failures.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for ResolveError {
    fn from(err: reqwest::Error) -> Self {
        Self::failed(err.to_string())
    }
}

impl From<MegaLinkError> for ResolveError {
    fn from(err: MegaLinkError) -> Self {
        Self::failed(err.to_string())
    }
}
