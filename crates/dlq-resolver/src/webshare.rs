//! Webshare resolver: POST `file_info` + `file_link` against the XML API and
//! map provider fatal codes onto the shared error taxonomy.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::ResolveError;
use crate::registry::SiteResolver;
use crate::target::ResolvedTarget;

const WEBSHARE_API: &str = "https://webshare.cz/api";
const HTTP_TIMEOUT: Duration = Duration::from_secs(20);

/// Resolver for webshare.cz share links.
pub struct WebshareResolver {
    http: reqwest::Client,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct InfoResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    size: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: String,
}

#[derive(Debug, Deserialize)]
struct LinkResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: String,
}

impl WebshareResolver {
    /// Resolver against the production API.
    #[must_use]
    pub fn new() -> Self {
        Self::with_api_base(WEBSHARE_API)
    }

    /// Resolver against a custom API base (tests).
    #[must_use]
    pub fn with_api_base(api_base: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(HTTP_TIMEOUT)
                .build()
                .unwrap_or_default(),
            api_base: api_base.into(),
        }
    }

    async fn post_form(&self, endpoint: &str, ident: &str) -> Result<String, ResolveError> {
        let url = format!("{}/{endpoint}/", self.api_base);
        let response = self
            .http
            .post(&url)
            .form(&[("ident", ident)])
            .send()
            .await?;
        Ok(response.text().await?)
    }

    async fn file_info(&self, ident: &str) -> Result<(String, i64), ResolveError> {
        let body = self.post_form("file_info", ident).await?;
        let info: InfoResponse = quick_xml::de::from_str(&body)
            .map_err(|err| ResolveError::failed(format!("webshare info response: {err}")))?;
        if !info.status.eq_ignore_ascii_case("ok") {
            return Err(ResolveError::failed(format!(
                "webshare_info_error:{}:{}",
                info.code, info.message
            )));
        }
        let size = info.size.trim().parse().unwrap_or(0);
        Ok((info.name, size))
    }

    async fn file_link(&self, ident: &str) -> Result<String, ResolveError> {
        let body = self.post_form("file_link", ident).await?;
        let link: LinkResponse = quick_xml::de::from_str(&body)
            .map_err(|err| ResolveError::failed(format!("webshare link response: {err}")))?;
        if link.status.eq_ignore_ascii_case("ok") {
            return Ok(link.link);
        }
        Err(match link.code.as_str() {
            "FILE_LINK_FATAL_1" => ResolveError::LoginRequired,
            "FILE_LINK_FATAL_2" => ResolveError::CaptchaNeeded,
            "FILE_LINK_FATAL_3" => ResolveError::QuotaExceeded,
            "FILE_LINK_FATAL_4" => ResolveError::TemporarilyUnavailable,
            code => ResolveError::failed(format!("webshare_link_error:{code}:{}", link.message)),
        })
    }
}

impl Default for WebshareResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SiteResolver for WebshareResolver {
    fn can_handle(&self, raw_url: &str) -> bool {
        Url::parse(raw_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_lowercase))
            .is_some_and(|host| host.contains("webshare.cz"))
    }

    async fn resolve(&self, raw_url: &str) -> Result<ResolvedTarget, ResolveError> {
        let url = Url::parse(raw_url).map_err(|err| ResolveError::failed(err.to_string()))?;
        let ident =
            extract_ident(&url).ok_or_else(|| ResolveError::failed("webshare_ident_not_found"))?;
        debug!(ident = %ident, "resolving webshare link");
        let (name, size) = self.file_info(&ident).await?;
        let link = self.file_link(&ident).await?;
        let mut target = ResolvedTarget::aria2(link);
        target.filename = Some(name).filter(|n| !n.is_empty());
        target.size_bytes = (size > 0).then_some(size);
        Ok(target)
    }
}

/// A share ident is at least five alphanumeric characters; it appears as a
/// query parameter, a path segment, or a fragment segment.
fn looks_like_ident(segment: &str) -> bool {
    segment.len() >= 5 && segment.chars().all(|c| c.is_ascii_alphanumeric())
}

fn extract_ident(url: &Url) -> Option<String> {
    for key in ["ident", "id"] {
        if let Some(value) = url
            .query_pairs()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.into_owned())
        {
            if !value.is_empty() {
                return Some(value);
            }
        }
    }
    let path_segments: Vec<&str> = url.path().trim_matches('/').split('/').collect();
    for segment in path_segments.iter().rev() {
        if looks_like_ident(segment) {
            return Some((*segment).to_string());
        }
    }
    if let Some(fragment) = url.fragment() {
        for segment in fragment.split('/').rev() {
            if looks_like_ident(segment) {
                return Some(segment.to_string());
            }
        }
    }
    None
}
