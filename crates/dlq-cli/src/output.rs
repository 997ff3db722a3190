//! Table formatting helpers.

use crate::client::JobView;

/// Human byte size, powers of 1024.
pub(crate) fn format_bytes(value: i64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    if value < 1024 {
        return format!("{value} B");
    }
    let mut amount = value as f64;
    let mut unit = 0;
    while amount >= 1024.0 && unit < UNITS.len() - 1 {
        amount /= 1024.0;
        unit += 1;
    }
    format!("{amount:.1} {unit}", unit = UNITS[unit])
}

/// Compact `h:mm:ss` / `m:ss` remaining-time rendering.
pub(crate) fn format_eta(seconds: i64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

/// Prefer the user-chosen name, then the resolved filename, then the URL.
pub(crate) fn display_name(job: &JobView) -> String {
    if !job.name.is_empty() {
        return job.name.clone();
    }
    if let Some(filename) = job.filename.as_deref().filter(|f| !f.is_empty()) {
        return filename.to_string();
    }
    short_url(&job.url)
}

pub(crate) fn short_url(url: &str) -> String {
    const MAX: usize = 48;
    if url.chars().count() <= MAX {
        return url.to_string();
    }
    let prefix: String = url.chars().take(MAX - 1).collect();
    format!("{prefix}…")
}

pub(crate) fn print_jobs(jobs: &[JobView]) {
    if jobs.is_empty() {
        println!("no jobs");
        return;
    }
    println!(
        "{:<5} {:<14} {:>10} {:>10} {:>11} {:>7} {:<18} NAME",
        "ID", "STATUS", "DONE", "SIZE", "SPEED", "ETA", "ERROR"
    );
    for job in jobs {
        let size = job.size_bytes.map_or_else(|| "-".to_string(), format_bytes);
        let speed = if job.download_speed > 0 {
            format!("{}/s", format_bytes(job.download_speed))
        } else {
            "-".to_string()
        };
        let eta = if job.eta_seconds > 0 {
            format_eta(job.eta_seconds)
        } else {
            "-".to_string()
        };
        println!(
            "{:<5} {:<14} {:>10} {:>10} {:>11} {:>7} {:<18} {}",
            job.id,
            job.status,
            format_bytes(job.bytes_done),
            size,
            speed,
            eta,
            job.error_code.as_deref().unwrap_or("-"),
            display_name(job),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_formatting_scales() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KiB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MiB");
    }

    #[test]
    fn eta_rendering_uses_compact_clock_form() {
        assert_eq!(format_eta(42), "0:42");
        assert_eq!(format_eta(95), "1:35");
        assert_eq!(format_eta(3700), "1:01:40");
    }

    #[test]
    fn long_urls_are_shortened() {
        let long = format!("https://example.com/{}", "x".repeat(100));
        let short = short_url(&long);
        assert!(short.chars().count() <= 48);
        assert!(short.ends_with('…'));
        assert_eq!(short_url("https://example.com/f"), "https://example.com/f");
    }
}
