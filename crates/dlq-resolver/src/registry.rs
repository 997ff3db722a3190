//! Resolver trait and dispatch registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ResolveError;
use crate::target::ResolvedTarget;

/// One site adapter: claims URLs and resolves them into targets.
#[async_trait]
pub trait SiteResolver: Send + Sync {
    /// Whether this resolver wants the URL during auto-detection.
    fn can_handle(&self, raw_url: &str) -> bool;

    /// Resolve the URL into a concrete target.
    async fn resolve(&self, raw_url: &str) -> Result<ResolvedTarget, ResolveError>;
}

/// Dispatches a URL either by explicit site tag or by first-matching
/// auto-detection in registration order.
#[derive(Default)]
pub struct ResolverRegistry {
    ordered: Vec<Arc<dyn SiteResolver>>,
    by_site: HashMap<String, Arc<dyn SiteResolver>>,
}

impl ResolverRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a resolver to the auto-detection order.
    pub fn register(&mut self, resolver: Arc<dyn SiteResolver>) {
        self.ordered.push(resolver);
    }

    /// Register a resolver under an explicit site tag (lowercased).
    pub fn register_site(&mut self, name: &str, resolver: Arc<dyn SiteResolver>) {
        let key = name.trim().to_lowercase();
        if key.is_empty() {
            return;
        }
        self.by_site.insert(key, resolver);
    }

    /// Auto-detect: first registered resolver whose `can_handle` accepts.
    pub async fn resolve(&self, raw_url: &str) -> Result<ResolvedTarget, ResolveError> {
        for resolver in &self.ordered {
            if resolver.can_handle(raw_url) {
                return resolver.resolve(raw_url).await;
            }
        }
        Err(ResolveError::NoResolver)
    }

    /// Dispatch by explicit site when given, auto-detect otherwise.
    pub async fn resolve_with_site(
        &self,
        site: Option<&str>,
        raw_url: &str,
    ) -> Result<ResolvedTarget, ResolveError> {
        match site.map(str::trim).filter(|s| !s.is_empty()) {
            Some(tag) => match self.by_site.get(&tag.to_lowercase()) {
                Some(resolver) => resolver.resolve(raw_url).await,
                None => Err(ResolveError::UnknownSite),
            },
            None => self.resolve(raw_url).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedResolver {
        prefix: &'static str,
        url: &'static str,
    }

    #[async_trait]
    impl SiteResolver for FixedResolver {
        fn can_handle(&self, raw_url: &str) -> bool {
            raw_url.starts_with(self.prefix)
        }

        async fn resolve(&self, _raw_url: &str) -> Result<ResolvedTarget, ResolveError> {
            Ok(ResolvedTarget::aria2(self.url))
        }
    }

    fn registry() -> ResolverRegistry {
        let mut registry = ResolverRegistry::new();
        let first = Arc::new(FixedResolver {
            prefix: "https://a.example",
            url: "https://a.example/final",
        });
        let second = Arc::new(FixedResolver {
            prefix: "https://",
            url: "https://b.example/final",
        });
        registry.register(first.clone());
        registry.register(second);
        registry.register_site("alpha", first);
        registry
    }

    #[tokio::test]
    async fn first_matching_resolver_wins() {
        let registry = registry();
        let target = registry
            .resolve("https://a.example/x")
            .await
            .expect("target");
        assert_eq!(target.url, "https://a.example/final");

        let target = registry
            .resolve("https://other.example/x")
            .await
            .expect("target");
        assert_eq!(target.url, "https://b.example/final");
    }

    #[tokio::test]
    async fn explicit_site_dispatch_ignores_can_handle() {
        let registry = registry();
        let target = registry
            .resolve_with_site(Some("ALPHA"), "ftp://unrelated")
            .await
            .expect("target");
        assert_eq!(target.url, "https://a.example/final");
    }

    #[tokio::test]
    async fn unknown_site_is_a_typed_error() {
        let registry = registry();
        let err = registry
            .resolve_with_site(Some("nope"), "https://a.example/x")
            .await
            .expect_err("unknown site");
        assert!(matches!(err, ResolveError::UnknownSite));
    }

    #[tokio::test]
    async fn unmatched_url_reports_no_resolver() {
        let registry = registry();
        let err = registry
            .resolve("ftp://example.com/file")
            .await
            .expect_err("no resolver");
        assert!(matches!(err, ResolveError::NoResolver));
    }
}
