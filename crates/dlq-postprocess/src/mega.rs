//! MEGA payload decryption.
//!
//! The engine downloads MEGA content as served: AES-CTR encrypted. This
//! step decrypts the file in place, streaming through a sibling temp file,
//! and, for 32-byte keys, verifies MEGA's condensed MAC over the
//! plaintext before the original is replaced. On any failure the original
//! file is left untouched.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use aes::Aes128;
use aes::cipher::array::Array as GenericArray;
use aes::cipher::{BlockCipherEncrypt, KeyInit, KeyIvInit, StreamCipher};
use async_trait::async_trait;
use dlq_resolver::link::{parse_content_key, parse_file_link};
use dlq_resolver::{MegaContentKey, is_mega_job};
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::error::PostprocessError;

type Aes128Ctr = ctr::Ctr128BE<Aes128>;

const CHUNK_BUF: usize = 1024 * 1024;

/// Decrypts MEGA payloads after download.
#[async_trait]
pub trait MegaDecryptor: Send + Sync {
    /// Decrypt `file_path` in place when the job is a MEGA job. Returns
    /// `Ok(true)` when decryption ran, `Ok(false)` when the job is not a
    /// MEGA job.
    async fn maybe_decrypt(
        &self,
        site: Option<&str>,
        raw_url: &str,
        file_path: &Path,
    ) -> Result<bool, PostprocessError>;
}

/// [`MegaDecryptor`] operating on local files.
#[derive(Debug, Default)]
pub struct MegaContentDecryptor;

impl MegaContentDecryptor {
    /// Construct the decryptor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MegaDecryptor for MegaContentDecryptor {
    async fn maybe_decrypt(
        &self,
        site: Option<&str>,
        raw_url: &str,
        file_path: &Path,
    ) -> Result<bool, PostprocessError> {
        if !is_mega_job(site, raw_url) {
            return Ok(false);
        }
        if file_path.as_os_str().is_empty() {
            return Err(PostprocessError::MissingFilePath);
        }
        let link = parse_file_link(raw_url)?;
        let key = parse_content_key(&link.file_key)?;

        debug!(file = %file_path.display(), "decrypting mega payload");
        let path = PathBuf::from(file_path);
        tokio::task::spawn_blocking(move || decrypt_file_in_place(&path, key))
            .await
            .map_err(|_| PostprocessError::TaskAborted)??;
        Ok(true)
    }
}

/// CTR-decrypt `path` into a sibling temp file, verify the MAC, then rename
/// over the original. The temp file inherits the original's permissions.
fn decrypt_file_in_place(path: &Path, key: MegaContentKey) -> Result<(), PostprocessError> {
    let mut input = File::open(path)?;
    let permissions = input.metadata()?.permissions();

    let mut iv = [0u8; 16];
    iv[..8].copy_from_slice(&key.nonce);
    let mut cipher = Aes128Ctr::new(&key.aes_key.into(), &iv.into());

    let mut mac = key
        .expect_mac
        .map(|expected| (CondensedMac::new(&key.aes_key, key.nonce), expected));

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let base = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut temp = tempfile::Builder::new()
        .prefix(&format!(".{base}.dlq-mega-"))
        .tempfile_in(dir)?;
    temp.as_file().set_permissions(permissions)?;

    let mut buf = vec![0u8; CHUNK_BUF];
    loop {
        let n = input.read(&mut buf)?;
        if n == 0 {
            break;
        }
        cipher.apply_keystream(&mut buf[..n]);
        if let Some((calculator, _)) = mac.as_mut() {
            calculator.update(&buf[..n]);
        }
        temp.as_file_mut().write_all(&buf[..n])?;
    }

    if let Some((mut calculator, expected)) = mac {
        let got = calculator.finalize();
        if !bool::from(got[..].ct_eq(&expected[..])) {
            return Err(PostprocessError::MacMismatch);
        }
    }
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

/// MEGA's condensed MAC over the plaintext.
///
/// Chunk k (0-based) spans `(k+1) * 0x20000` bytes for k < 8, then
/// `0x100000`. Each chunk starts its MAC from `nonce || nonce`; every
/// 16-byte block (last one zero-padded) is XORed in and AES-encrypted.
/// Finished chunks fold into the file MAC the same way. The final 8 bytes
/// condense the file MAC by XORing its big-endian words pairwise.
struct CondensedMac {
    block: Aes128,
    base: [u8; 16],
    file_mac: [u8; 16],
    chunk_mac: [u8; 16],
    pending: [u8; 16],
    pending_len: usize,
    chunk_index: u64,
    chunk_remaining: u64,
    chunk_has_data: bool,
}

fn chunk_size(index: u64) -> u64 {
    if index < 8 {
        (index + 1) * 0x20000
    } else {
        0x100000
    }
}

impl CondensedMac {
    fn new(aes_key: &[u8; 16], nonce: [u8; 8]) -> Self {
        let mut base = [0u8; 16];
        base[..8].copy_from_slice(&nonce);
        base[8..].copy_from_slice(&nonce);
        Self {
            block: Aes128::new(aes_key.into()),
            base,
            file_mac: [0u8; 16],
            chunk_mac: base,
            pending: [0u8; 16],
            pending_len: 0,
            chunk_index: 0,
            chunk_remaining: chunk_size(0),
            chunk_has_data: false,
        }
    }

    fn update(&mut self, mut data: &[u8]) {
        while !data.is_empty() {
            let take = (data.len() as u64).min(self.chunk_remaining) as usize;
            self.absorb(&data[..take]);
            data = &data[take..];
            self.chunk_remaining -= take as u64;
            if self.chunk_remaining == 0 {
                self.finish_chunk();
                self.chunk_index += 1;
                self.chunk_mac = self.base;
                self.chunk_remaining = chunk_size(self.chunk_index);
            }
        }
    }

    fn absorb(&mut self, mut data: &[u8]) {
        if data.is_empty() {
            return;
        }
        self.chunk_has_data = true;
        while !data.is_empty() {
            let space = 16 - self.pending_len;
            let take = space.min(data.len());
            self.pending[self.pending_len..self.pending_len + take]
                .copy_from_slice(&data[..take]);
            self.pending_len += take;
            data = &data[take..];
            if self.pending_len == 16 {
                let block = self.pending;
                self.mix(&block);
                self.pending_len = 0;
            }
        }
    }

    fn finish_chunk(&mut self) {
        if !self.chunk_has_data {
            return;
        }
        if self.pending_len > 0 {
            let mut padded = [0u8; 16];
            padded[..self.pending_len].copy_from_slice(&self.pending[..self.pending_len]);
            self.mix(&padded);
            self.pending_len = 0;
        }
        for (file_byte, chunk_byte) in self.file_mac.iter_mut().zip(self.chunk_mac.iter()) {
            *file_byte ^= chunk_byte;
        }
        self.block
            .encrypt_block(GenericArray::from_mut_slice(&mut self.file_mac));
        self.chunk_has_data = false;
    }

    fn mix(&mut self, block: &[u8; 16]) {
        for (mac_byte, data_byte) in self.chunk_mac.iter_mut().zip(block.iter()) {
            *mac_byte ^= data_byte;
        }
        self.block
            .encrypt_block(GenericArray::from_mut_slice(&mut self.chunk_mac));
    }

    fn finalize(&mut self) -> [u8; 8] {
        self.finish_chunk();
        let w0 = u32::from_be_bytes(self.file_mac[0..4].try_into().unwrap_or_default());
        let w1 = u32::from_be_bytes(self.file_mac[4..8].try_into().unwrap_or_default());
        let w2 = u32::from_be_bytes(self.file_mac[8..12].try_into().unwrap_or_default());
        let w3 = u32::from_be_bytes(self.file_mac[12..16].try_into().unwrap_or_default());
        let mut out = [0u8; 8];
        out[..4].copy_from_slice(&(w0 ^ w1).to_be_bytes());
        out[4..].copy_from_slice(&(w2 ^ w3).to_be_bytes());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    fn test_plaintext(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 + 7) as u8).collect()
    }

    /// Assemble a 32-byte key token for a chosen AES key/nonce whose MAC
    /// matches `plaintext`.
    fn key_token_for(plaintext: &[u8], aes_key: [u8; 16], nonce: [u8; 8]) -> String {
        let mut calculator = CondensedMac::new(&aes_key, nonce);
        calculator.update(plaintext);
        let mac = calculator.finalize();

        let mut raw = [0u8; 32];
        raw[16..24].copy_from_slice(&nonce);
        raw[24..32].copy_from_slice(&mac);
        for i in 0..16 {
            raw[i] = aes_key[i] ^ raw[i + 16];
        }
        URL_SAFE_NO_PAD.encode(raw)
    }

    fn encrypt(plaintext: &[u8], aes_key: [u8; 16], nonce: [u8; 8]) -> Vec<u8> {
        let mut iv = [0u8; 16];
        iv[..8].copy_from_slice(&nonce);
        let mut cipher = Aes128Ctr::new(&aes_key.into(), &iv.into());
        let mut data = plaintext.to_vec();
        cipher.apply_keystream(&mut data);
        data
    }

    #[test]
    fn chunk_sizes_grow_then_plateau() {
        assert_eq!(chunk_size(0), 0x20000);
        assert_eq!(chunk_size(1), 0x40000);
        assert_eq!(chunk_size(7), 0x100000);
        assert_eq!(chunk_size(8), 0x100000);
        assert_eq!(chunk_size(100), 0x100000);
    }

    #[test]
    fn mac_is_insensitive_to_update_granularity() {
        let plaintext = test_plaintext(0x20000 + 12345);
        let aes_key = [9u8; 16];
        let nonce = [3u8; 8];

        let mut whole = CondensedMac::new(&aes_key, nonce);
        whole.update(&plaintext);
        let expected = whole.finalize();

        let mut pieces = CondensedMac::new(&aes_key, nonce);
        for chunk in plaintext.chunks(7) {
            pieces.update(chunk);
        }
        assert_eq!(pieces.finalize(), expected);
    }

    #[tokio::test]
    async fn round_trip_decrypts_and_verifies() {
        let plaintext = test_plaintext(0x20000 + 4096);
        let aes_key = [0x42u8; 16];
        let nonce = [0x17u8; 8];
        let token = key_token_for(&plaintext, aes_key, nonce);
        let url = format!("https://mega.nz/file/abcdef12#{token}");

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("payload.bin");
        std::fs::write(&path, encrypt(&plaintext, aes_key, nonce)).expect("write");

        let decryptor = MegaContentDecryptor::new();
        let attempted = decryptor
            .maybe_decrypt(None, &url, &path)
            .await
            .expect("decrypt");
        assert!(attempted);
        assert_eq!(std::fs::read(&path).expect("read"), plaintext);
    }

    #[tokio::test]
    async fn a_single_bit_flip_fails_mac_and_preserves_the_file() {
        let plaintext = test_plaintext(50_000);
        let aes_key = [0x24u8; 16];
        let nonce = [0x08u8; 8];
        let token = key_token_for(&plaintext, aes_key, nonce);
        let url = format!("https://mega.nz/file/abcdef12#{token}");

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("payload.bin");
        let mut encrypted = encrypt(&plaintext, aes_key, nonce);
        encrypted[31_337] ^= 0x01;
        std::fs::write(&path, &encrypted).expect("write");

        let decryptor = MegaContentDecryptor::new();
        let err = decryptor
            .maybe_decrypt(Some("mega"), &url, &path)
            .await
            .expect_err("mac mismatch");
        assert!(matches!(err, PostprocessError::MacMismatch));
        assert_eq!(
            std::fs::read(&path).expect("read"),
            encrypted,
            "original bytes untouched on failure"
        );
    }

    #[tokio::test]
    async fn sixteen_byte_keys_skip_verification() {
        let plaintext = test_plaintext(1024);
        let aes_key = [0x11u8; 16];
        let token = URL_SAFE_NO_PAD.encode(aes_key);
        let url = format!("https://mega.nz/file/abcdef12#{token}");

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("payload.bin");
        std::fs::write(&path, encrypt(&plaintext, aes_key, [0u8; 8])).expect("write");

        let decryptor = MegaContentDecryptor::new();
        let attempted = decryptor
            .maybe_decrypt(None, &url, &path)
            .await
            .expect("decrypt");
        assert!(attempted);
        assert_eq!(std::fs::read(&path).expect("read"), plaintext);
    }

    #[tokio::test]
    async fn non_mega_jobs_are_skipped() {
        let decryptor = MegaContentDecryptor::new();
        let attempted = decryptor
            .maybe_decrypt(None, "https://example.com/file.bin", Path::new("/nope"))
            .await
            .expect("skip");
        assert!(!attempted);
    }
}
