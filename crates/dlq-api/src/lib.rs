#![forbid(unsafe_code)]

//! HTTP control surface.
//!
//! A thin axum layer over [`dlq_queue::JobService`] and
//! [`dlq_config::SettingsService`]; all business rules live below it.

mod browse;
mod error;
mod jobs;
mod meta;
mod router;
mod settings;
mod state;

pub use error::ApiError;
pub use router::{router, serve};
pub use state::{ApiState, Meta};
