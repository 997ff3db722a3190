//! Output path validation and filename sanitizing.
//!
//! `out_dir` validation is purely lexical: the cleaned path must equal an
//! allowed root or start with `root + separator`. No symlink resolution,
//! no filesystem access, no `..` escape.

use std::path::{Component, Path, PathBuf};

use crate::error::ServiceError;

/// Lexically normalise a path: resolve `.` and `..` without touching the
/// filesystem.
fn clean_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(Component::RootDir);
                }
            }
            other => out.push(other),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Validate a job `out_dir`: absolute, cleaned, and inside some allowed
/// root.
pub fn clean_out_dir(out_dir: &str, allowed_roots: &[PathBuf]) -> Result<String, ServiceError> {
    if out_dir.trim().is_empty() {
        return Err(ServiceError::invalid("missing out_dir"));
    }
    if allowed_roots.is_empty() {
        return Err(ServiceError::invalid("no volumes configured"));
    }
    let clean = clean_path(Path::new(out_dir.trim()));
    if !clean.is_absolute() {
        return Err(ServiceError::invalid("out_dir must be absolute"));
    }
    let inside = allowed_roots.iter().any(|root| {
        let root = clean_path(root);
        clean == root || clean.starts_with(&root)
    });
    if !inside {
        return Err(ServiceError::invalid("out_dir is outside allowed roots"));
    }
    Ok(clean.to_string_lossy().into_owned())
}

/// Validate a user-chosen output filename: no separators, not `.`/`..`.
/// Empty input means "no preference".
pub fn clean_user_filename(name: &str) -> Result<Option<String>, ServiceError> {
    let name = name.trim();
    if name.is_empty() {
        return Ok(None);
    }
    if Path::new(name).is_absolute() || name.contains('/') || name.contains('\\') {
        return Err(ServiceError::invalid(
            "name must not contain path separators",
        ));
    }
    if name == "." || name == ".." {
        return Err(ServiceError::invalid("invalid name"));
    }
    Ok(Some(name.to_string()))
}

/// Reduce a resolver-reported filename to a safe basename; hostile values
/// collapse to `None`.
#[must_use]
pub fn sanitize_filename(name: &str) -> Option<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return None;
    }
    let base = Path::new(trimmed)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())?;
    if base.is_empty() || base == "." || base == ".." || base.contains('/') || base.contains('\\') {
        return None;
    }
    Some(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roots() -> Vec<PathBuf> {
        vec![PathBuf::from("/data"), PathBuf::from("/media/library")]
    }

    #[test]
    fn out_dir_must_sit_under_a_root() {
        assert_eq!(clean_out_dir("/data", &roots()).expect("root"), "/data");
        assert_eq!(
            clean_out_dir("/data/movies/", &roots()).expect("nested"),
            "/data/movies"
        );
        assert_eq!(
            clean_out_dir("/media/library/a/./b", &roots()).expect("cleaned"),
            "/media/library/a/b"
        );

        assert!(clean_out_dir("/etc", &roots()).is_err());
        assert!(clean_out_dir("data/movies", &roots()).is_err());
        assert!(clean_out_dir("", &roots()).is_err());
        assert!(
            clean_out_dir("/data/../etc", &roots()).is_err(),
            "dot-dot escape is cleaned away before the containment check"
        );
        assert!(
            clean_out_dir("/database", &roots()).is_err(),
            "prefix match must be component-wise"
        );
    }

    #[test]
    fn no_roots_means_no_creations() {
        let err = clean_out_dir("/data", &[]).expect_err("no roots");
        assert!(err.to_string().contains("no volumes configured"));
    }

    #[test]
    fn user_filenames_reject_separators() {
        assert_eq!(clean_user_filename("").expect("empty"), None);
        assert_eq!(
            clean_user_filename(" archive.zip ").expect("ok").as_deref(),
            Some("archive.zip")
        );
        assert!(clean_user_filename("a/b").is_err());
        assert!(clean_user_filename("a\\b").is_err());
        assert!(clean_user_filename("/abs").is_err());
        assert!(clean_user_filename(".").is_err());
        assert!(clean_user_filename("..").is_err());
    }

    #[test]
    fn sanitize_reduces_to_basename() {
        assert_eq!(sanitize_filename("file.bin").as_deref(), Some("file.bin"));
        assert_eq!(
            sanitize_filename("/tmp/evil/file.bin").as_deref(),
            Some("file.bin")
        );
        assert_eq!(sanitize_filename("  "), None);
        assert_eq!(sanitize_filename("."), None);
        assert_eq!(sanitize_filename(".."), None);
    }
}
