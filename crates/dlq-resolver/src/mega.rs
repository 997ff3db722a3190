//! MEGA resolver: fetch file metadata (temporary download URL, size,
//! encrypted attributes) from the MEGA API and decrypt the filename.
//!
//! Attributes are AES-CBC encrypted with a zero IV under the folded file
//! key; the plaintext is `MEGA{"n":"<name>", ...}` padded with NUL bytes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use aes::cipher::{BlockModeDecrypt, KeyIvInit, block_padding::NoPadding};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::error::ResolveError;
use crate::link::{parse_content_key, parse_file_link};
use crate::registry::SiteResolver;
use crate::target::ResolvedTarget;

const MEGA_API: &str = "https://g.api.mega.co.nz/cs";
const HTTP_TIMEOUT: Duration = Duration::from_secs(20);

type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

/// Resolver for public MEGA file links.
pub struct MegaResolver {
    http: reqwest::Client,
    api_base: String,
    request_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct FileInfoResponse {
    /// Temporary download URL.
    #[serde(default)]
    g: String,
    /// File size in bytes.
    #[serde(default)]
    s: i64,
    /// Encrypted attribute blob.
    #[serde(default)]
    at: String,
    /// API error code when non-zero.
    #[serde(default)]
    e: i64,
}

impl MegaResolver {
    /// Resolver against the production API.
    #[must_use]
    pub fn new() -> Self {
        Self::with_api_base(MEGA_API)
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
            request_id: AtomicU64::new(1),
        }
    }

    async fn file_info(&self, file_id: &str) -> Result<FileInfoResponse, ResolveError> {
        let request_id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let separator = if self.api_base.contains('?') { '&' } else { '?' };
        let url = format!("{}{separator}id={request_id}", self.api_base);
        let payload = json!([{ "a": "g", "g": 1, "p": file_id }]);

        let response = self.http.post(&url).json(&payload).send().await?;
        if !response.status().is_success() {
            return Err(ResolveError::failed(format!(
                "mega_api_http_status:{}",
                response.status().as_u16()
            )));
        }
        let body: Vec<serde_json::Value> = response.json().await?;
        let first = body
            .into_iter()
            .next()
            .ok_or_else(|| ResolveError::failed("mega_api_empty_response"))?;

        // A bare number is an API-level error code.
        if let Some(code) = first.as_i64() {
            return Err(map_api_error(code));
        }
        let info: FileInfoResponse = serde_json::from_value(first)
            .map_err(|err| ResolveError::failed(format!("mega_api_response: {err}")))?;
        if info.e != 0 {
            return Err(map_api_error(info.e));
        }
        if info.g.is_empty() {
            return Err(ResolveError::failed("mega_download_url_missing"));
        }
        if info.at.is_empty() {
            return Err(ResolveError::failed("mega_attributes_missing"));
        }
        Ok(info)
    }
}

impl Default for MegaResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SiteResolver for MegaResolver {
    fn can_handle(&self, raw_url: &str) -> bool {
        Url::parse(raw_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_lowercase))
            .is_some_and(|host| host.contains("mega.nz") || host.contains("mega.co.nz"))
    }

    async fn resolve(&self, raw_url: &str) -> Result<ResolvedTarget, ResolveError> {
        let link = parse_file_link(raw_url)?;
        debug!(file_id = %link.file_id, "resolving mega link");
        let info = self.file_info(&link.file_id).await?;
        let filename = decrypt_filename(&info.at, &link.file_key)?;
        let mut target = ResolvedTarget::aria2(info.g);
        target.filename = Some(filename);
        target.size_bytes = (info.s > 0).then_some(info.s);
        Ok(target)
    }
}

/// Decrypt the attribute blob and pull the `n` (name) attribute out of it.
pub(crate) fn decrypt_filename(attributes: &str, file_key: &str) -> Result<String, ResolveError> {
    let key = parse_content_key(file_key)?;
    let mut encrypted = URL_SAFE_NO_PAD
        .decode(attributes.trim())
        .map_err(|_| ResolveError::failed("mega_base64_decode_failed"))?;
    if encrypted.is_empty() || encrypted.len() % 16 != 0 {
        return Err(ResolveError::failed("mega_attributes_invalid_length"));
    }

    let decryptor = Aes128CbcDec::new(&key.aes_key.into(), &[0u8; 16].into());
    let plain = decryptor
        .decrypt_padded::<NoPadding>(&mut encrypted)
        .map_err(|_| ResolveError::failed("mega_attributes_invalid_length"))?;
    let plain = {
        let end = plain
            .iter()
            .rposition(|&b| b != 0)
            .map_or(0, |index| index + 1);
        &plain[..end]
    };
    let json_part = plain
        .strip_prefix(b"MEGA")
        .ok_or_else(|| ResolveError::failed("mega_attributes_invalid_prefix"))?;

    #[derive(Deserialize)]
    struct Attrs {
        #[serde(default)]
        n: String,
    }
    let attrs: Attrs = serde_json::from_slice(json_part)
        .map_err(|err| ResolveError::failed(format!("mega_attributes_json: {err}")))?;
    if attrs.n.trim().is_empty() {
        return Err(ResolveError::failed("mega_filename_missing"));
    }
    Ok(attrs.n)
}

fn map_api_error(code: i64) -> ResolveError {
    match code {
        -17 => ResolveError::QuotaExceeded,
        -18 | -4 => ResolveError::TemporarilyUnavailable,
        -11 | -14 | -16 => ResolveError::LoginRequired,
        code => ResolveError::failed(format!("mega_api_error:{code}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes::cipher::BlockModeEncrypt;
    use httpmock::MockServer;
    use httpmock::prelude::*;

    type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;

    fn encrypt_attributes(name: &str, aes_key: &[u8; 16]) -> String {
        let mut plain = format!("MEGA{{\"n\":\"{name}\"}}").into_bytes();
        while plain.len() % 16 != 0 {
            plain.push(0);
        }
        let encryptor = Aes128CbcEnc::new(aes_key.into(), &[0u8; 16].into());
        let len = plain.len();
        encryptor
            .encrypt_padded::<NoPadding>(&mut plain, len)
            .expect("aligned buffer");
        URL_SAFE_NO_PAD.encode(plain)
    }

    /// 32-byte key whose folded AES half is deterministic.
    fn test_key_token() -> (String, [u8; 16]) {
        let mut raw = [0u8; 32];
        for (i, byte) in raw.iter_mut().enumerate() {
            *byte = (i * 7 + 3) as u8;
        }
        let mut aes_key = [0u8; 16];
        for (i, byte) in aes_key.iter_mut().enumerate() {
            *byte = raw[i] ^ raw[i + 16];
        }
        (URL_SAFE_NO_PAD.encode(raw), aes_key)
    }

    #[test]
    fn decrypts_the_filename_attribute() {
        let (token, aes_key) = test_key_token();
        let attrs = encrypt_attributes("movie.mkv", &aes_key);
        let name = decrypt_filename(&attrs, &token).expect("name");
        assert_eq!(name, "movie.mkv");
    }

    #[test]
    fn rejects_attributes_without_prefix() {
        let (token, aes_key) = test_key_token();
        // Encrypt a blob that decrypts without the MEGA prefix.
        let mut plain = b"NOPE{\"n\":\"x\"}\x00\x00\x00".to_vec();
        while plain.len() % 16 != 0 {
            plain.push(0);
        }
        let encryptor = Aes128CbcEnc::new(&aes_key.into(), &[0u8; 16].into());
        let len = plain.len();
        encryptor
            .encrypt_padded_mut::<NoPadding>(&mut plain, len)
            .expect("aligned");
        let attrs = URL_SAFE_NO_PAD.encode(plain);
        let err = decrypt_filename(&attrs, &token).expect_err("prefix");
        assert!(err.to_string().contains("mega_attributes_invalid_prefix"));
    }

    #[tokio::test]
    async fn resolves_metadata_from_api() {
        let (token, aes_key) = test_key_token();
        let attrs = encrypt_attributes("payload.bin", &aes_key);

        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/cs").body_includes("\"p\":\"fileid99\"");
            then.status(200).json_body(json!([{
                "g": "https://gfs123.mega.co.nz/down/xyz",
                "s": 4096,
                "at": attrs,
            }]));
        });

        let resolver = MegaResolver::with_api_base(format!("{}/cs", server.base_url()));
        let target = resolver
            .resolve(&format!("https://mega.nz/file/fileid99#{token}"))
            .await
            .expect("target");
        assert_eq!(target.url, "https://gfs123.mega.co.nz/down/xyz");
        assert_eq!(target.filename.as_deref(), Some("payload.bin"));
        assert_eq!(target.size_bytes, Some(4096));
    }

    #[tokio::test]
    async fn maps_api_error_codes() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/cs");
            then.status(200).json_body(json!([-17]));
        });

        let (token, _) = test_key_token();
        let resolver = MegaResolver::with_api_base(format!("{}/cs", server.base_url()));
        let err = resolver
            .resolve(&format!("https://mega.nz/file/fileid99#{token}"))
            .await
            .expect_err("quota");
        assert!(matches!(err, ResolveError::QuotaExceeded));
    }
}
