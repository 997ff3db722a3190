//! Archive extraction through an external tool.
//!
//! The primary tool is a 7z-compatible binary (`7zz` by default). For rar
//! inputs the primary tool sometimes cannot cope (old compression methods,
//! odd volume layouts); in that case a dedicated `unar` is tried when
//! installed.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::PostprocessError;
use crate::multipart::{is_archive_file, resolve_archive_entry_path};

const DEFAULT_COMMAND: &str = "7zz";
const FALLBACK_COMMAND: &str = "unar";

/// Output markers meaning the primary tool could not read the archive.
const FALLBACK_MARKERS: [&str; 3] = [
    "cannot open the file as archive",
    "can't open as archive",
    "unsupported method",
];

/// Extracts downloaded archives in place.
#[async_trait]
pub trait ArchiveExtractor: Send + Sync {
    /// Extract `archive_path` into `out_dir`. Returns `Ok(true)` when a tool
    /// actually ran, `Ok(false)` when the input is not an archive.
    async fn maybe_extract(
        &self,
        archive_path: &Path,
        out_dir: &Path,
        password: Option<&str>,
    ) -> Result<bool, PostprocessError>;
}

/// [`ArchiveExtractor`] invoking external command-line tools.
pub struct CommandArchiveExtractor {
    command: String,
}

impl CommandArchiveExtractor {
    /// Extractor using the default 7z-compatible binary.
    #[must_use]
    pub fn new() -> Self {
        Self::with_command(DEFAULT_COMMAND)
    }

    /// Extractor using a custom 7z-compatible binary.
    #[must_use]
    pub fn with_command(command: impl Into<String>) -> Self {
        let command = command.into();
        let command = if command.trim().is_empty() {
            DEFAULT_COMMAND.to_string()
        } else {
            command
        };
        Self { command }
    }
}

impl Default for CommandArchiveExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArchiveExtractor for CommandArchiveExtractor {
    async fn maybe_extract(
        &self,
        archive_path: &Path,
        out_dir: &Path,
        password: Option<&str>,
    ) -> Result<bool, PostprocessError> {
        let entry = resolve_archive_entry_path(archive_path);
        if !is_archive_file(&entry) {
            return Ok(false);
        }
        let password = password.map(str::trim).filter(|p| !p.is_empty());

        debug!(archive = %entry.display(), tool = %self.command, "running archive tool");
        let primary = run_tool(&self.command, &entry, out_dir, password).await;
        let mut output = match primary {
            ToolOutcome::Success => return Ok(true),
            ToolOutcome::Failed(output) => {
                if !should_try_fallback(&self.command, &entry, &output) {
                    return Err(PostprocessError::ToolFailed { output });
                }
                output
            }
        };

        if tool_available(FALLBACK_COMMAND) {
            debug!(archive = %entry.display(), "retrying with unar fallback");
            match run_tool(FALLBACK_COMMAND, &entry, out_dir, password).await {
                ToolOutcome::Success => return Ok(true),
                ToolOutcome::Failed(fallback_output) => {
                    if output.is_empty() {
                        output = fallback_output;
                    } else {
                        output =
                            format!("{output}\n--- unar fallback failed ---\n{fallback_output}");
                    }
                }
            }
        }
        Err(PostprocessError::ToolFailed { output })
    }
}

enum ToolOutcome {
    Success,
    Failed(String),
}

async fn run_tool(
    command: &str,
    archive_path: &Path,
    out_dir: &Path,
    password: Option<&str>,
) -> ToolOutcome {
    let args = tool_args(command, archive_path, out_dir, password);
    let spawned = Command::new(command)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await;
    match spawned {
        Ok(output) => {
            let mut combined = String::from_utf8_lossy(&output.stdout).trim().to_string();
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            if !stderr.is_empty() {
                if !combined.is_empty() {
                    combined.push('\n');
                }
                combined.push_str(stderr);
            }
            if output.status.success() {
                ToolOutcome::Success
            } else {
                ToolOutcome::Failed(combined)
            }
        }
        Err(err) => ToolOutcome::Failed(format!("{command}: {err}")),
    }
}

fn tool_kind(command: &str) -> &'static str {
    let base = Path::new(command.trim())
        .file_name()
        .map(|name| name.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match base.as_str() {
        "unar" => "unar",
        // Custom 7z-compatible commands keep the 7z flag convention.
        _ => "7z",
    }
}

fn tool_args(
    command: &str,
    archive_path: &Path,
    out_dir: &Path,
    password: Option<&str>,
) -> Vec<String> {
    let mut args = Vec::new();
    match tool_kind(command) {
        "unar" => {
            args.push("-f".to_string());
            args.push("-o".to_string());
            args.push(out_dir.to_string_lossy().into_owned());
            if let Some(password) = password {
                args.push("-p".to_string());
                args.push(password.to_string());
            }
        }
        _ => {
            args.push("x".to_string());
            args.push("-y".to_string());
            args.push("-aoa".to_string());
            args.push(format!("-o{}", out_dir.to_string_lossy()));
            if let Some(password) = password {
                args.push(format!("-p{password}"));
            }
        }
    }
    args.push(archive_path.to_string_lossy().into_owned());
    args
}

fn should_try_fallback(command: &str, archive_path: &Path, output: &str) -> bool {
    if tool_kind(command) == "unar" {
        return false;
    }
    // A missing primary tool leaves its spawn error in the output.
    if output.contains("No such file or directory") || output.ends_with("not found") {
        return true;
    }
    let is_rar = archive_path
        .to_string_lossy()
        .to_lowercase()
        .ends_with(".rar");
    if !is_rar {
        return false;
    }
    let lower = output.to_lowercase();
    FALLBACK_MARKERS.iter().any(|marker| lower.contains(marker))
}

fn tool_available(command: &str) -> bool {
    let Some(paths) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&paths).any(|dir| dir.join(command).is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seven_zip_argument_shape() {
        let args = tool_args(
            "7zz",
            Path::new("/data/archive.zip"),
            Path::new("/data"),
            Some("pw"),
        );
        assert_eq!(args, vec!["x", "-y", "-aoa", "-o/data", "-ppw", "/data/archive.zip"]);

        let args = tool_args("7zz", Path::new("/data/archive.zip"), Path::new("/data"), None);
        assert!(!args.iter().any(|arg| arg.starts_with("-p")));
    }

    #[test]
    fn unar_argument_shape() {
        let args = tool_args(
            "unar",
            Path::new("/data/archive.rar"),
            Path::new("/data"),
            Some("pw"),
        );
        assert_eq!(args, vec!["-f", "-o", "/data", "-p", "pw", "/data/archive.rar"]);
    }

    #[test]
    fn fallback_only_for_rar_failures_of_the_primary() {
        let rar = Path::new("/d/a.rar");
        assert!(should_try_fallback(
            "7zz",
            rar,
            "ERROR: Cannot open the file as archive"
        ));
        assert!(should_try_fallback("7zz", rar, "Unsupported Method"));
        assert!(!should_try_fallback("7zz", rar, "wrong password"));
        assert!(!should_try_fallback(
            "7zz",
            Path::new("/d/a.zip"),
            "cannot open the file as archive"
        ));
        assert!(!should_try_fallback(
            "unar",
            rar,
            "cannot open the file as archive"
        ));
    }

    #[tokio::test]
    async fn non_archives_are_skipped_without_running_a_tool() {
        let extractor = CommandArchiveExtractor::with_command("/definitely/not/a/tool");
        let attempted = extractor
            .maybe_extract(Path::new("/data/video.mkv"), Path::new("/data"), None)
            .await
            .expect("skip");
        assert!(!attempted);
    }

    #[tokio::test]
    async fn failing_tool_surfaces_combined_output() {
        // `false` exists on any sane PATH and fails without output.
        let extractor = CommandArchiveExtractor::with_command("false");
        let err = extractor
            .maybe_extract(Path::new("/data/archive.zip"), Path::new("/data"), None)
            .await
            .expect_err("failure");
        assert!(matches!(err, PostprocessError::ToolFailed { .. }));
    }

    #[test]
    fn blank_command_falls_back_to_default() {
        let extractor = CommandArchiveExtractor::with_command("  ");
        assert_eq!(extractor.command, DEFAULT_COMMAND);
    }
}
