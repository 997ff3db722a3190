//! Multipart archive naming rules.
//!
//! Two volume conventions exist in the wild: `name.partN.rar` and the old
//! `name.rar`/`name.r00`/`name.r01` style. Extraction must start from the
//! first volume, and the orchestrator must not extract while sibling
//! volumes are still downloading; both decisions start from the helpers
//! here.

use std::path::{Path, PathBuf};

const ARCHIVE_SUFFIXES: [&str; 13] = [
    ".zip", ".7z", ".rar", ".tar", ".tar.gz", ".tgz", ".tar.bz2", ".tbz2", ".tar.xz", ".txz",
    ".gz", ".bz2", ".xz",
];

fn base_name(path: &Path) -> Option<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().trim().to_string())
        .filter(|name| !name.is_empty())
}

/// Whether the filename carries a recognised archive extension.
#[must_use]
pub fn is_archive_file(path: &Path) -> bool {
    let Some(name) = base_name(path) else {
        return false;
    };
    let lower = name.to_lowercase();
    ARCHIVE_SUFFIXES
        .iter()
        .any(|suffix| lower.ends_with(suffix))
}

fn all_digits(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

/// For a non-first volume, compute the first volume's path; otherwise
/// return the input unchanged. Zero-padding of the part number is kept
/// (`part03` → `part01`).
#[must_use]
pub fn multipart_first_volume(path: &Path) -> PathBuf {
    let Some(base) = base_name(path) else {
        return path.to_path_buf();
    };
    // Volume suffix surgery is byte-indexed; non-ASCII names are never
    // multipart volumes in practice, so leave them alone.
    if !base.is_ascii() {
        return path.to_path_buf();
    }
    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    let lower = base.to_lowercase();

    if lower.ends_with(".rar") {
        let stem = &base[..base.len() - 4];
        let stem_lower = stem.to_lowercase();
        if let Some(idx) = stem_lower.rfind(".part") {
            let digits = &stem[idx + ".part".len()..];
            if all_digits(digits) {
                if let Ok(number) = digits.parse::<u64>() {
                    if number > 1 {
                        let first = format!("{:0width$}", 1, width = digits.len());
                        let name = format!("{}.part{first}.rar", &stem[..idx]);
                        return dir.join(name);
                    }
                }
            }
        }
        return path.to_path_buf();
    }

    // name.rNN → name.rar
    if base.len() > 4 {
        let bytes = lower.as_bytes();
        let tail = &lower[lower.len() - 4..];
        if tail.starts_with('.') && bytes[lower.len() - 3] == b'r' && all_digits(&tail[2..]) {
            return dir.join(format!("{}.rar", &base[..base.len() - 4]));
        }
    }

    path.to_path_buf()
}

/// First-volume path if that file exists on disk, else the original input.
#[must_use]
pub fn resolve_archive_entry_path(path: &Path) -> PathBuf {
    let candidate = multipart_first_volume(path);
    if candidate != path && candidate.exists() {
        return candidate;
    }
    path.to_path_buf()
}

/// Group key for multipart membership: `(key, explicit)`.
///
/// Volumes of the `partN.rar` and `.rNN` styles are explicit members of
/// their set. A plain `*.rar` gets an implicit `.rNN`-style key: it only
/// counts as part of a set when some sibling marks that set explicit.
#[must_use]
pub fn multipart_group_key(path: &Path) -> Option<(String, bool)> {
    let base = base_name(path)?;
    if !base.is_ascii() {
        return None;
    }
    let dir = path
        .parent()
        .map(|parent| parent.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let lower = base.to_lowercase();

    if lower.ends_with(".rar") {
        let stem = &base[..base.len() - 4];
        let stem_lower = stem.to_lowercase();
        if let Some(idx) = stem_lower.rfind(".part") {
            let digits = &stem[idx + ".part".len()..];
            if all_digits(digits) {
                let prefix = stem_lower[..idx].to_string();
                return Some((format!("{dir}|partrar|{prefix}"), true));
            }
        }
        return Some((format!("{dir}|rstyle|{stem_lower}"), false));
    }

    if base.len() > 4 {
        let bytes = lower.as_bytes();
        let tail = &lower[lower.len() - 4..];
        if tail.starts_with('.') && bytes[lower.len() - 3] == b'r' && all_digits(&tail[2..]) {
            let stem = lower[..lower.len() - 4].to_string();
            return Some((format!("{dir}|rstyle|{stem}"), true));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_extensions_are_recognised() {
        for name in [
            "a.zip", "a.7z", "a.rar", "a.tar", "a.tar.gz", "a.tgz", "a.tar.bz2", "a.tbz2",
            "a.tar.xz", "a.txz", "a.gz", "a.bz2", "a.xz", "A.ZIP",
        ] {
            assert!(is_archive_file(Path::new(name)), "{name} is an archive");
        }
        for name in ["a.mkv", "a.rarx", "a", "a.tar.lz"] {
            assert!(!is_archive_file(Path::new(name)), "{name} is not");
        }
    }

    #[test]
    fn part_volumes_resolve_to_the_first() {
        assert_eq!(
            multipart_first_volume(Path::new("/d/show.part2.rar")),
            PathBuf::from("/d/show.part1.rar")
        );
        assert_eq!(
            multipart_first_volume(Path::new("/d/show.part10.rar")),
            PathBuf::from("/d/show.part01.rar"),
            "zero padding is preserved"
        );
        assert_eq!(
            multipart_first_volume(Path::new("/d/show.part1.rar")),
            PathBuf::from("/d/show.part1.rar")
        );
        assert_eq!(
            multipart_first_volume(Path::new("/d/show.rar")),
            PathBuf::from("/d/show.rar")
        );
    }

    #[test]
    fn r_style_volumes_resolve_to_the_rar() {
        assert_eq!(
            multipart_first_volume(Path::new("/d/show.r00")),
            PathBuf::from("/d/show.rar")
        );
        assert_eq!(
            multipart_first_volume(Path::new("/d/show.r17")),
            PathBuf::from("/d/show.rar")
        );
        assert_eq!(
            multipart_first_volume(Path::new("/d/show.raw")),
            PathBuf::from("/d/show.raw"),
            "non-digit tails are untouched"
        );
    }

    #[test]
    fn entry_resolution_requires_the_first_volume_on_disk() {
        let dir = std::env::temp_dir().join(format!("dlq-multipart-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("mkdir");
        let first = dir.join("set.part1.rar");
        std::fs::write(&first, b"x").expect("write");

        let resolved = resolve_archive_entry_path(&dir.join("set.part2.rar"));
        assert_eq!(resolved, first);

        let missing = resolve_archive_entry_path(&dir.join("other.part2.rar"));
        assert_eq!(missing, dir.join("other.part2.rar"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn group_keys_mark_explicit_membership() {
        let (key, explicit) =
            multipart_group_key(Path::new("/d/Show.part1.rar")).expect("grouped");
        assert_eq!(key, "/d|partrar|show");
        assert!(explicit);

        let (key2, explicit2) =
            multipart_group_key(Path::new("/d/show.part2.rar")).expect("grouped");
        assert_eq!(key, key2, "volumes share the group key");
        assert!(explicit2);

        let (key, explicit) = multipart_group_key(Path::new("/d/show.r00")).expect("grouped");
        assert_eq!(key, "/d|rstyle|show");
        assert!(explicit);

        let (key2, explicit2) = multipart_group_key(Path::new("/d/show.rar")).expect("grouped");
        assert_eq!(key, key2, "plain rar joins the r-style set implicitly");
        assert!(!explicit2);

        assert!(multipart_group_key(Path::new("/d/show.zip")).is_none());
    }
}
