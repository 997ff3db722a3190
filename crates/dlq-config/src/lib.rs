#![forbid(unsafe_code)]

//! Configuration for the daemon: immutable process environment (state
//! directory, listen address, engine endpoint, allowed output roots) and
//! the mutable settings document (`settings.json`) whose changes take
//! effect on the runner's next tick.

pub mod env;
pub mod error;
pub mod settings;

pub use env::DaemonConfig;
pub use error::ConfigError;
pub use settings::{Settings, SettingsPatch, SettingsService};
