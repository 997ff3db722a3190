#![forbid(unsafe_code)]

//! Post-download processing.
//!
//! Two independent steps can apply to a finished download: MEGA payload
//! decryption (the engine downloads MEGA content still encrypted) and
//! archive extraction via an external tool. The orchestrator decides which
//! steps run; this crate implements them plus the multipart-archive naming
//! rules the orchestrator needs for its wait logic.

pub mod archive;
pub mod error;
pub mod mega;
pub mod multipart;

pub use archive::{ArchiveExtractor, CommandArchiveExtractor};
pub use error::PostprocessError;
pub use mega::{MegaContentDecryptor, MegaDecryptor};
pub use multipart::{is_archive_file, multipart_group_key, resolve_archive_entry_path};
