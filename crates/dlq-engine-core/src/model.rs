//! DTOs exchanged with a download engine.

use std::collections::BTreeMap;

use serde::Serialize;

/// Engine-side state of a single transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    /// Actively downloading.
    Active,
    /// Queued inside the engine, not yet started.
    Waiting,
    /// Paused inside the engine.
    Paused,
    /// Finished successfully.
    Complete,
    /// Failed; the status record carries the error message.
    Error,
    /// Removed from the engine.
    Removed,
    /// Any state string this client does not recognise.
    Unknown,
}

impl TransferState {
    /// Map the engine's wire status string onto a state.
    #[must_use]
    pub fn from_wire(value: &str) -> Self {
        match value.trim() {
            "active" => Self::Active,
            "waiting" => Self::Waiting,
            "paused" => Self::Paused,
            "complete" => Self::Complete,
            "error" => Self::Error,
            "removed" => Self::Removed,
            _ => Self::Unknown,
        }
    }
}

/// A single file belonging to a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineFile {
    /// Absolute path the engine writes to.
    pub path: String,
}

/// Snapshot of a transfer as reported by the engine.
#[derive(Debug, Clone)]
pub struct EngineStatus {
    /// Opaque engine handle.
    pub gid: String,
    /// Current transfer state.
    pub state: TransferState,
    /// Total size in bytes, zero when unknown.
    pub total_bytes: u64,
    /// Bytes completed so far.
    pub completed_bytes: u64,
    /// Current download speed in bytes per second.
    pub download_speed: u64,
    /// Engine error code, present when `state` is [`TransferState::Error`].
    pub error_code: Option<String>,
    /// Engine error message, present when `state` is [`TransferState::Error`].
    pub error_message: Option<String>,
    /// Files the transfer writes to.
    pub files: Vec<EngineFile>,
}

impl EngineStatus {
    /// First non-empty file path reported by the engine, if any.
    #[must_use]
    pub fn first_file_path(&self) -> Option<&str> {
        self.files
            .iter()
            .map(|file| file.path.trim())
            .find(|path| !path.is_empty())
    }
}

/// Ordered key/value option map passed to the engine on admission.
///
/// Keys follow the engine's own option vocabulary (`dir`, `out`, `header`,
/// `continue`, ...). Ordering is stable so log lines and tests are
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EngineOptions(BTreeMap<String, String>);

impl EngineOptions {
    /// Empty option map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an option.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Look up an option value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Iterate options in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of options present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_state_maps_known_strings() {
        assert_eq!(TransferState::from_wire("active"), TransferState::Active);
        assert_eq!(TransferState::from_wire("complete"), TransferState::Complete);
        assert_eq!(TransferState::from_wire(" paused "), TransferState::Paused);
        assert_eq!(TransferState::from_wire("bogus"), TransferState::Unknown);
    }

    #[test]
    fn first_file_path_skips_blank_entries() {
        let status = EngineStatus {
            gid: "gid-1".into(),
            state: TransferState::Complete,
            total_bytes: 10,
            completed_bytes: 10,
            download_speed: 0,
            error_code: None,
            error_message: None,
            files: vec![
                EngineFile { path: "   ".into() },
                EngineFile {
                    path: "/data/file.bin".into(),
                },
            ],
        };
        assert_eq!(status.first_file_path(), Some("/data/file.bin"));
    }

    #[test]
    fn options_keep_key_order() {
        let mut options = EngineOptions::new();
        options.insert("out", "file.bin");
        options.insert("dir", "/data");
        let keys: Vec<_> = options.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["dir", "out"]);
        assert_eq!(options.get("dir"), Some("/data"));
    }
}
