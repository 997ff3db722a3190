//! User-facing rendering helpers shared by events and log lines.

use dlq_resolver::is_webshare_job;
use dlq_store::JobStatus;

/// Render a URL for logs and events. Fragments can carry key material
/// (MEGA links), so everything after `#` is masked.
#[must_use]
pub fn redact_url(url: &str) -> String {
    match url.split_once('#') {
        Some((prefix, _)) => format!("{prefix}#***"),
        None => url.to_string(),
    }
}

/// User-facing status label. Paused webshare jobs surface as `stopped`:
/// their resolved link expires, so resume is a requeue rather than an
/// engine unpause.
#[must_use]
pub fn display_status(status: JobStatus, site: Option<&str>, raw_url: &str) -> String {
    if status == JobStatus::Paused && is_webshare_job(site, raw_url) {
        return "stopped".to_string();
    }
    status.as_str().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragments_are_masked() {
        assert_eq!(
            redact_url("https://mega.nz/file/abc#secretkey"),
            "https://mega.nz/file/abc#***"
        );
        assert_eq!(
            redact_url("https://example.com/file"),
            "https://example.com/file"
        );
    }

    #[test]
    fn paused_webshare_reads_stopped() {
        assert_eq!(
            display_status(JobStatus::Paused, Some("webshare"), ""),
            "stopped"
        );
        assert_eq!(
            display_status(JobStatus::Paused, None, "https://webshare.cz/file/abc12"),
            "stopped"
        );
        assert_eq!(
            display_status(JobStatus::Paused, None, "https://example.com/f"),
            "paused"
        );
        assert_eq!(
            display_status(JobStatus::Downloading, Some("webshare"), ""),
            "downloading"
        );
    }
}
