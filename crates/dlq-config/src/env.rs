//! Process environment configuration.
//!
//! Output roots come from `DATA_*` variables whose values are container
//! mount specs (`host:container[:opts]`); the container-side path of each
//! mount becomes an allowed root for job `out_dir` validation.

use std::collections::BTreeSet;
use std::path::PathBuf;

/// Immutable daemon configuration assembled from the environment.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Directory for the database and the settings document.
    pub state_dir: PathBuf,
    /// SQLite database path.
    pub db_path: PathBuf,
    /// HTTP listen address (`host:port`).
    pub listen_addr: String,
    /// aria2 JSON-RPC endpoint.
    pub aria2_rpc: String,
    /// aria2 RPC secret, when configured.
    pub aria2_secret: Option<String>,
    /// Allowed roots for job output directories, sorted and deduplicated.
    pub allowed_roots: Vec<PathBuf>,
}

impl DaemonConfig {
    /// Assemble configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        let vars: Vec<(String, String)> = std::env::vars().collect();
        Self::from_vars(&vars)
    }

    /// Assemble configuration from an explicit variable list (tests).
    #[must_use]
    pub fn from_vars(vars: &[(String, String)]) -> Self {
        let get = |key: &str| -> Option<String> {
            vars.iter()
                .find(|(name, _)| name == key)
                .map(|(_, value)| value.clone())
                .filter(|value| !value.is_empty())
        };

        let state_dir = PathBuf::from(get("DLQ_STATE_DIR").unwrap_or_else(|| "/state".to_string()));
        let db_path = get("DLQ_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|| state_dir.join("dlq.db"));
        let listen_addr = get("DLQ_HTTP_ADDR").unwrap_or_else(|| {
            let host = get("DLQ_HTTP_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
            let port = get("DLQ_HTTP_PORT").unwrap_or_else(|| "8099".to_string());
            format!("{host}:{port}")
        });
        let aria2_rpc =
            get("ARIA2_RPC").unwrap_or_else(|| "http://127.0.0.1:6800/jsonrpc".to_string());
        let aria2_secret = get("ARIA2_SECRET");
        let allowed_roots = allowed_roots_from_vars(vars);

        Self {
            state_dir,
            db_path,
            listen_addr,
            aria2_rpc,
            aria2_secret,
            allowed_roots,
        }
    }
}

fn allowed_roots_from_vars(vars: &[(String, String)]) -> Vec<PathBuf> {
    let mut roots = BTreeSet::new();
    for (name, value) in vars {
        if !name.starts_with("DATA_") {
            continue;
        }
        let mount = value.trim();
        if mount.is_empty() {
            continue;
        }
        if let Some(path) = container_path_from_mount(mount) {
            roots.insert(PathBuf::from(path));
        }
    }
    roots.into_iter().collect()
}

/// Extract the container-side path from a mount spec.
///
/// `path` → itself; `host:container` → container; with a trailing options
/// segment the last path-looking component wins (`host:container:ro`).
fn container_path_from_mount(mount: &str) -> Option<String> {
    if mount.is_empty() {
        return None;
    }
    if !mount.contains(':') {
        return Some(mount.to_string());
    }
    let parts: Vec<&str> = mount.split(':').collect();
    if parts.len() < 2 {
        return None;
    }
    if parts.len() == 2 {
        let container = parts[1].trim();
        return (!container.is_empty()).then(|| container.to_string());
    }
    let last = parts[parts.len() - 1].trim();
    if last.contains('/') {
        return Some(last.to_string());
    }
    let second_last = parts[parts.len() - 2].trim();
    (!second_last.is_empty()).then(|| second_last.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = DaemonConfig::from_vars(&[]);
        assert_eq!(config.state_dir, PathBuf::from("/state"));
        assert_eq!(config.db_path, PathBuf::from("/state/dlq.db"));
        assert_eq!(config.listen_addr, "0.0.0.0:8099");
        assert_eq!(config.aria2_rpc, "http://127.0.0.1:6800/jsonrpc");
        assert!(config.aria2_secret.is_none());
        assert!(config.allowed_roots.is_empty());
    }

    #[test]
    fn explicit_addr_beats_host_and_port() {
        let config = DaemonConfig::from_vars(&vars(&[
            ("DLQ_HTTP_ADDR", "127.0.0.1:9000"),
            ("DLQ_HTTP_HOST", "10.0.0.1"),
            ("DLQ_HTTP_PORT", "1234"),
        ]));
        assert_eq!(config.listen_addr, "127.0.0.1:9000");

        let config = DaemonConfig::from_vars(&vars(&[
            ("DLQ_HTTP_HOST", "10.0.0.1"),
            ("DLQ_HTTP_PORT", "1234"),
        ]));
        assert_eq!(config.listen_addr, "10.0.0.1:1234");
    }

    #[test]
    fn mount_specs_yield_container_paths() {
        let config = DaemonConfig::from_vars(&vars(&[
            ("DATA_MOVIES", "/mnt/tank/movies:/data/movies:ro"),
            ("DATA_SHOWS", "/mnt/tank/shows:/data/shows"),
            ("DATA_PLAIN", "/data/plain"),
            ("DATA_DUPLICATE", "/other/host:/data/plain"),
            ("DATA_EMPTY", "  "),
            ("UNRELATED", "/nope"),
        ]));
        assert_eq!(
            config.allowed_roots,
            vec![
                PathBuf::from("/data/movies"),
                PathBuf::from("/data/plain"),
                PathBuf::from("/data/shows"),
            ]
        );
    }

    #[test]
    fn windowsy_three_part_mounts_keep_the_path() {
        assert_eq!(
            container_path_from_mount("C\\stuff:/data/win:rw"),
            Some("/data/win".to_string())
        );
        assert_eq!(
            container_path_from_mount("host:/data/x:ro"),
            Some("/data/x".to_string())
        );
    }
}
