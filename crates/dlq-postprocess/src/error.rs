//! Post-processing error type.

use dlq_resolver::MegaLinkError;
use thiserror::Error;

/// Errors raised by the post-processing steps.
#[derive(Debug, Error)]
pub enum PostprocessError {
    /// The job reached post-processing without a usable file path.
    #[error("missing file path")]
    MissingFilePath,
    /// The MEGA link on the job no longer parses.
    #[error(transparent)]
    Link(#[from] MegaLinkError),
    /// The decrypted payload failed MAC verification; the original file is
    /// left untouched.
    #[error("mega content mac mismatch")]
    MacMismatch,
    /// Filesystem failure during decryption.
    #[error("io failure during post-processing")]
    Io(#[from] std::io::Error),
    /// The archive tool ran and failed, or no tool could handle the input.
    #[error("archive decrypt command failed: {output}")]
    ToolFailed {
        /// Combined tool output (or spawn error text).
        output: String,
    },
    /// The blocking decrypt task was cancelled or panicked.
    #[error("post-processing task aborted")]
    TaskAborted,
}
