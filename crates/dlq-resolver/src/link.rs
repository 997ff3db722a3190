//! MEGA public file link grammar and key material derivation.
//!
//! Two link shapes exist: the current `/file/<id>#<key>` form and the legacy
//! `#!<id>!<key>` fragment form. Both carry URL-safe base64 tokens. A 16-byte
//! key is used directly; a 32-byte key folds into the AES key (low half XOR
//! high half) and additionally carries the CTR nonce and the expected
//! condensed MAC of the plaintext.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use thiserror::Error;
use url::Url;

/// Errors produced while parsing MEGA links or key tokens.
#[derive(Debug, Error)]
pub enum MegaLinkError {
    /// The URL did not parse at all.
    #[error("mega link is not a valid url")]
    InvalidUrl,
    /// The URL parsed but is not a public file link.
    #[error("mega public file link required")]
    NotAFileLink,
    /// The id or key token contains characters outside URL-safe base64.
    #[error("mega link tokens are invalid")]
    InvalidTokens,
    /// The key token is not decodable base64.
    #[error("mega key decode failed")]
    KeyDecode,
    /// The decoded key has an unsupported length.
    #[error("mega key has invalid length {length}")]
    KeyLength {
        /// Decoded byte length.
        length: usize,
    },
}

/// Identifier and key token extracted from a public file link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MegaFileLink {
    /// Public file identifier.
    pub file_id: String,
    /// URL-safe base64 key token.
    pub file_key: String,
}

/// Key material for payload decryption.
#[derive(Debug, Clone, Copy)]
pub struct MegaContentKey {
    /// AES-128 key for CTR payload and CBC attribute decryption.
    pub aes_key: [u8; 16],
    /// CTR nonce; the IV is `nonce || 0u64`.
    pub nonce: [u8; 8],
    /// Expected condensed MAC; absent for 16-byte keys.
    pub expect_mac: Option<[u8; 8]>,
}

/// Parse a public MEGA file link into its id and key tokens.
pub fn parse_file_link(raw: &str) -> Result<MegaFileLink, MegaLinkError> {
    let url = Url::parse(raw.trim()).map_err(|_| MegaLinkError::InvalidUrl)?;
    let path = url.path().trim_matches('/');
    let fragment = url.fragment().unwrap_or("").trim();

    let (file_id, file_key) = if let Some(rest) = path.strip_prefix("file/") {
        let id = rest.split('/').next().unwrap_or("").trim();
        (id.to_string(), fragment.to_string())
    } else if let Some(rest) = fragment.strip_prefix('!') {
        let mut parts = rest.splitn(2, '!');
        let id = parts.next().unwrap_or("").trim().to_string();
        let key = parts.next().unwrap_or("").trim().to_string();
        (id, key)
    } else {
        return Err(MegaLinkError::NotAFileLink);
    };

    if file_id.is_empty() || file_key.is_empty() {
        return Err(MegaLinkError::NotAFileLink);
    }
    if !is_valid_token(&file_id) || !is_valid_token(&file_key) {
        return Err(MegaLinkError::InvalidTokens);
    }
    Ok(MegaFileLink { file_id, file_key })
}

/// Decode a key token into payload key material.
pub fn parse_content_key(token: &str) -> Result<MegaContentKey, MegaLinkError> {
    let raw = URL_SAFE_NO_PAD
        .decode(token.trim())
        .map_err(|_| MegaLinkError::KeyDecode)?;
    match raw.len() {
        32 => {
            let mut aes_key = [0u8; 16];
            for (i, byte) in aes_key.iter_mut().enumerate() {
                *byte = raw[i] ^ raw[i + 16];
            }
            let mut nonce = [0u8; 8];
            nonce.copy_from_slice(&raw[16..24]);
            let mut mac = [0u8; 8];
            mac.copy_from_slice(&raw[24..32]);
            Ok(MegaContentKey {
                aes_key,
                nonce,
                expect_mac: Some(mac),
            })
        }
        16 => {
            let mut aes_key = [0u8; 16];
            aes_key.copy_from_slice(&raw);
            Ok(MegaContentKey {
                aes_key,
                nonce: [0u8; 8],
                expect_mac: None,
            })
        }
        length => Err(MegaLinkError::KeyLength { length }),
    }
}

fn is_valid_token(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_modern_file_link() {
        let link = parse_file_link("https://mega.nz/file/AbCd1234#k-e_y0").expect("link");
        assert_eq!(link.file_id, "AbCd1234");
        assert_eq!(link.file_key, "k-e_y0");
    }

    #[test]
    fn parses_legacy_fragment_link() {
        let link = parse_file_link("https://mega.co.nz/#!oldid42!oldkey_-").expect("link");
        assert_eq!(link.file_id, "oldid42");
        assert_eq!(link.file_key, "oldkey_-");
    }

    #[test]
    fn rejects_folder_and_malformed_links() {
        assert!(matches!(
            parse_file_link("https://mega.nz/folder/abc#def"),
            Err(MegaLinkError::NotAFileLink)
        ));
        assert!(matches!(
            parse_file_link("https://mega.nz/file/abc"),
            Err(MegaLinkError::NotAFileLink)
        ));
        assert!(matches!(
            parse_file_link("https://mega.nz/file/ab!cd#key"),
            Err(MegaLinkError::InvalidTokens)
        ));
    }

    #[test]
    fn folds_a_32_byte_key() {
        let mut raw = [0u8; 32];
        for (i, byte) in raw.iter_mut().enumerate() {
            *byte = i as u8;
        }
        let token = URL_SAFE_NO_PAD.encode(raw);
        let key = parse_content_key(&token).expect("key");
        for (i, byte) in key.aes_key.iter().enumerate() {
            assert_eq!(*byte, raw[i] ^ raw[i + 16]);
        }
        assert_eq!(key.nonce, [16, 17, 18, 19, 20, 21, 22, 23]);
        assert_eq!(key.expect_mac, Some([24, 25, 26, 27, 28, 29, 30, 31]));
    }

    #[test]
    fn accepts_a_16_byte_key_without_mac() {
        let token = URL_SAFE_NO_PAD.encode([7u8; 16]);
        let key = parse_content_key(&token).expect("key");
        assert_eq!(key.aes_key, [7u8; 16]);
        assert_eq!(key.nonce, [0u8; 8]);
        assert!(key.expect_mac.is_none());
    }

    #[test]
    fn rejects_other_key_lengths() {
        let token = URL_SAFE_NO_PAD.encode([1u8; 24]);
        assert!(matches!(
            parse_content_key(&token),
            Err(MegaLinkError::KeyLength { length: 24 })
        ));
    }
}
