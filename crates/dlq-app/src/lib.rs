#![forbid(unsafe_code)]

//! Daemon bootstrap: configuration, logging, wiring, and shutdown.

mod bootstrap;
mod logging;

pub use bootstrap::run_app;
