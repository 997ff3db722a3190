//! Pass-through resolver for direct HTTP/HTTPS URLs.

use async_trait::async_trait;

use crate::error::ResolveError;
use crate::registry::SiteResolver;
use crate::target::ResolvedTarget;

/// Direct URLs need no resolution; the engine downloads them as-is.
#[derive(Debug, Default)]
pub struct HttpResolver;

impl HttpResolver {
    /// Construct the pass-through resolver.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SiteResolver for HttpResolver {
    fn can_handle(&self, raw_url: &str) -> bool {
        raw_url.starts_with("http://") || raw_url.starts_with("https://")
    }

    async fn resolve(&self, raw_url: &str) -> Result<ResolvedTarget, ResolveError> {
        Ok(ResolvedTarget::aria2(raw_url))
    }
}
