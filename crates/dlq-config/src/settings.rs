//! Mutable runtime settings persisted as a JSON document.
//!
//! The runner reads the accessors every tick, so an update is picked up
//! without a restart.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;

const SETTINGS_FILE: &str = "settings.json";

/// The full settings document. Missing fields fall back to defaults so
/// documents written by older builds keep loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Maximum number of jobs in `downloading` at once.
    pub concurrency: u32,
    /// Default retry ceiling for new jobs.
    pub max_attempts: u32,
    /// Whether downloaded archives are extracted automatically.
    pub auto_decrypt: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            concurrency: 2,
            max_attempts: 5,
            auto_decrypt: false,
        }
    }
}

/// Partial update applied through the HTTP surface.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsPatch {
    /// New concurrency, 1..=10.
    pub concurrency: Option<u32>,
    /// New default retry ceiling, 1..=20.
    pub max_attempts: Option<u32>,
    /// New auto-decrypt flag.
    pub auto_decrypt: Option<bool>,
}

/// Thread-safe settings holder with load/save semantics.
pub struct SettingsService {
    path: PathBuf,
    current: RwLock<Settings>,
}

impl SettingsService {
    /// Load `settings.json` from the state directory, falling back to
    /// defaults when the file does not exist yet.
    pub fn load_or_default(state_dir: &Path) -> Result<Self, ConfigError> {
        let path = state_dir.join(SETTINGS_FILE);
        let settings = match fs::read(&path) {
            Ok(bytes) => {
                serde_json::from_slice(&bytes).map_err(|source| ConfigError::ParseSettings {
                    path: path.clone(),
                    source,
                })?
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Settings::default(),
            Err(source) => {
                return Err(ConfigError::ReadSettings {
                    path: path.clone(),
                    source,
                });
            }
        };
        Ok(Self {
            path,
            current: RwLock::new(settings),
        })
    }

    /// Current settings snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Settings {
        *self.current.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Current download concurrency.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.snapshot().concurrency as usize
    }

    /// Current default retry ceiling.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.snapshot().max_attempts
    }

    /// Whether archives are extracted automatically.
    #[must_use]
    pub fn auto_decrypt(&self) -> bool {
        self.snapshot().auto_decrypt
    }

    /// Validate and apply a patch, persisting on success. Returns the new
    /// snapshot.
    pub fn apply(&self, patch: SettingsPatch) -> Result<Settings, ConfigError> {
        if let Some(concurrency) = patch.concurrency {
            if !(1..=10).contains(&concurrency) {
                return Err(ConfigError::InvalidSetting {
                    field: "concurrency",
                    reason: "must be between 1 and 10",
                });
            }
        }
        if let Some(max_attempts) = patch.max_attempts {
            if !(1..=20).contains(&max_attempts) {
                return Err(ConfigError::InvalidSetting {
                    field: "max_attempts",
                    reason: "must be between 1 and 20",
                });
            }
        }

        let updated = {
            let mut guard = self
                .current
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if let Some(concurrency) = patch.concurrency {
                guard.concurrency = concurrency;
            }
            if let Some(max_attempts) = patch.max_attempts {
                guard.max_attempts = max_attempts;
            }
            if let Some(auto_decrypt) = patch.auto_decrypt {
                guard.auto_decrypt = auto_decrypt;
            }
            *guard
        };
        self.save(updated)?;
        info!(
            concurrency = updated.concurrency,
            max_attempts = updated.max_attempts,
            auto_decrypt = updated.auto_decrypt,
            "settings updated"
        );
        Ok(updated)
    }

    fn save(&self, settings: Settings) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::WriteSettings {
                path: self.path.clone(),
                source,
            })?;
        }
        let body = serde_json::to_vec_pretty(&settings).map_err(|source| {
            ConfigError::ParseSettings {
                path: self.path.clone(),
                source,
            }
        })?;
        fs::write(&self.path, body).map_err(|source| ConfigError::WriteSettings {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_when_no_file_exists() {
        let dir = TempDir::new().expect("tempdir");
        let service = SettingsService::load_or_default(dir.path()).expect("service");
        assert_eq!(service.snapshot(), Settings::default());
        assert_eq!(service.concurrency(), 2);
        assert!(!service.auto_decrypt());
    }

    #[test]
    fn apply_persists_and_reloads() {
        let dir = TempDir::new().expect("tempdir");
        let service = SettingsService::load_or_default(dir.path()).expect("service");
        let updated = service
            .apply(SettingsPatch {
                concurrency: Some(4),
                max_attempts: Some(9),
                auto_decrypt: Some(true),
            })
            .expect("apply");
        assert_eq!(updated.concurrency, 4);

        let reloaded = SettingsService::load_or_default(dir.path()).expect("service");
        let snapshot = reloaded.snapshot();
        assert_eq!(snapshot.concurrency, 4);
        assert_eq!(snapshot.max_attempts, 9);
        assert!(snapshot.auto_decrypt);
    }

    #[test]
    fn out_of_range_values_are_rejected_without_mutation() {
        let dir = TempDir::new().expect("tempdir");
        let service = SettingsService::load_or_default(dir.path()).expect("service");
        let err = service
            .apply(SettingsPatch {
                concurrency: Some(0),
                ..SettingsPatch::default()
            })
            .expect_err("range");
        assert!(matches!(
            err,
            ConfigError::InvalidSetting {
                field: "concurrency",
                ..
            }
        ));

        let err = service
            .apply(SettingsPatch {
                max_attempts: Some(21),
                ..SettingsPatch::default()
            })
            .expect_err("range");
        assert!(matches!(
            err,
            ConfigError::InvalidSetting {
                field: "max_attempts",
                ..
            }
        ));
        assert_eq!(service.snapshot(), Settings::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = TempDir::new().expect("tempdir");
        std::fs::write(dir.path().join(SETTINGS_FILE), b"{not json").expect("write");
        let err = SettingsService::load_or_default(dir.path()).expect_err("malformed");
        assert!(matches!(err, ConfigError::ParseSettings { .. }));
    }
}
