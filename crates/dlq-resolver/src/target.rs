//! The resolved download target handed to the orchestrator.

use std::collections::BTreeMap;

/// Engine family a target is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TargetKind {
    /// An aria2-compatible engine speaking JSON-RPC.
    Aria2,
}

/// A concrete, immediately-downloadable target produced by a resolver.
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    /// Engine family this target requires.
    pub kind: TargetKind,
    /// Final download URL.
    pub url: String,
    /// Extra request headers the engine must send.
    pub headers: BTreeMap<String, String>,
    /// Engine options the resolver wants applied (e.g. `continue=false`).
    pub options: BTreeMap<String, String>,
    /// Provider-reported filename, if known.
    pub filename: Option<String>,
    /// Provider-reported size in bytes, if known.
    pub size_bytes: Option<i64>,
}

impl ResolvedTarget {
    /// Pass-through target: the URL itself is directly downloadable.
    #[must_use]
    pub fn aria2(url: impl Into<String>) -> Self {
        Self {
            kind: TargetKind::Aria2,
            url: url.into(),
            headers: BTreeMap::new(),
            options: BTreeMap::new(),
            filename: None,
            size_bytes: None,
        }
    }
}
