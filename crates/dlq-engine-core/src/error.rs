//! Error taxonomy for engine operations.
//!
//! The external engine reports failures as free-form RPC messages. Two
//! categories matter to the orchestrator and are classified here by message
//! substring: a lost GID (the engine forgot the transfer) and an illegal
//! state transition (pause/unpause/remove at the wrong moment).

use thiserror::Error;

/// Message fragments that mean the engine no longer knows the GID.
const GID_NOT_FOUND_MARKERS: [&str; 3] = ["no such download", "gid cannot be found", "not found"];

/// Message fragments that mean the requested transition is illegal right now.
const ACTION_NOT_ALLOWED_MARKERS: [&str; 4] = [
    "cannot be paused now",
    "cannot be unpaused now",
    "cannot be resumed now",
    "cannot be removed now",
];

/// Errors surfaced by a [`crate::DownloadEngine`] implementation.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine has no record of the requested GID.
    #[error("engine lost the download: {message}")]
    GidNotFound {
        /// Raw engine message.
        message: String,
    },
    /// The engine refused the action in the transfer's current state.
    #[error("engine refused the action: {message}")]
    ActionNotAllowed {
        /// Raw engine message.
        message: String,
    },
    /// Any other RPC-level failure reported by the engine.
    #[error("engine rpc error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// JSON-RPC error message.
        message: String,
    },
    /// The request never produced a well-formed RPC response.
    #[error("engine transport failed: {message}")]
    Transport {
        /// Human-readable transport failure.
        message: String,
    },
    /// The engine answered with a payload the client could not interpret.
    #[error("engine returned an invalid response: {message}")]
    InvalidResponse {
        /// Description of the malformed payload.
        message: String,
    },
}

impl EngineError {
    /// Classify a raw RPC error into the sentinel categories the
    /// orchestrator dispatches on, falling back to [`EngineError::Rpc`].
    #[must_use]
    pub fn from_rpc(code: i64, message: String) -> Self {
        let lower = message.to_lowercase();
        if GID_NOT_FOUND_MARKERS.iter().any(|m| lower.contains(m)) {
            return Self::GidNotFound { message };
        }
        if ACTION_NOT_ALLOWED_MARKERS.iter().any(|m| lower.contains(m)) {
            return Self::ActionNotAllowed { message };
        }
        Self::Rpc { code, message }
    }

    /// Whether the engine reported a lost GID.
    #[must_use]
    pub fn is_gid_not_found(&self) -> bool {
        matches!(self, Self::GidNotFound { .. })
    }

    /// Whether the engine refused an illegal state transition.
    #[must_use]
    pub fn is_action_not_allowed(&self) -> bool {
        matches!(self, Self::ActionNotAllowed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gid_not_found_messages_classified() {
        for message in [
            "No such download for GID#2089b05ecca3d829",
            "GID cannot be found",
            "Active Download not found for GID#abc",
        ] {
            let err = EngineError::from_rpc(1, message.to_string());
            assert!(err.is_gid_not_found(), "expected gid-not-found for {message:?}");
        }
    }

    #[test]
    fn action_not_allowed_messages_classified() {
        for message in [
            "GID#abc cannot be paused now",
            "GID#abc cannot be unpaused now",
            "GID#abc cannot be resumed now",
            "GID#abc cannot be removed now",
        ] {
            let err = EngineError::from_rpc(1, message.to_string());
            assert!(
                err.is_action_not_allowed(),
                "expected action-not-allowed for {message:?}"
            );
        }
    }

    #[test]
    fn other_messages_stay_rpc() {
        let err = EngineError::from_rpc(24, "authorization failed".to_string());
        assert!(matches!(err, EngineError::Rpc { code: 24, .. }));
        assert!(!err.is_gid_not_found());
        assert!(!err.is_action_not_allowed());
    }
}
