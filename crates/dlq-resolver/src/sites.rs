//! Site detection from explicit tags or URL hosts.

use url::Url;

fn host_contains(raw_url: &str, needles: &[&str]) -> bool {
    let raw = raw_url.trim();
    if raw.is_empty() {
        return false;
    }
    if let Ok(url) = Url::parse(raw) {
        if let Some(host) = url.host_str() {
            let host = host.to_lowercase();
            if needles.iter().any(|needle| host.contains(needle)) {
                return true;
            }
        }
    }
    let lower = raw.to_lowercase();
    needles.iter().any(|needle| lower.contains(needle))
}

fn site_is(site: Option<&str>, name: &str) -> bool {
    site.map(str::trim)
        .is_some_and(|tag| tag.eq_ignore_ascii_case(name))
}

/// Whether the job points at MEGA, from its explicit site tag or URL host.
#[must_use]
pub fn is_mega_job(site: Option<&str>, raw_url: &str) -> bool {
    site_is(site, "mega") || host_contains(raw_url, &["mega.nz", "mega.co.nz"])
}

/// Whether the job points at Webshare, from its explicit site tag or URL
/// host.
#[must_use]
pub fn is_webshare_job(site: Option<&str>, raw_url: &str) -> bool {
    site_is(site, "webshare") || host_contains(raw_url, &["webshare.cz"])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_mega_by_tag_and_host() {
        assert!(is_mega_job(Some("mega"), ""));
        assert!(is_mega_job(Some(" MEGA "), "https://example.com/x"));
        assert!(is_mega_job(None, "https://mega.nz/file/abc#def"));
        assert!(is_mega_job(None, "https://mega.co.nz/#!a!b"));
        assert!(!is_mega_job(None, "https://example.com/mega-story"));
    }

    #[test]
    fn detects_webshare_by_tag_and_host() {
        assert!(is_webshare_job(Some("webshare"), ""));
        assert!(is_webshare_job(None, "https://webshare.cz/#/file/abc123"));
        assert!(!is_webshare_job(None, "https://example.com/file"));
    }
}
