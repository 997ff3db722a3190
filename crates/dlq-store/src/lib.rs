#![forbid(unsafe_code)]

//! Durable persistence for jobs and their append-only event trail.
//!
//! The store is the single source of truth: the runner and the service layer
//! go through it for every state change, and it owns the SQLite schema.

pub mod error;
pub mod job;
pub mod store;

#[cfg(test)]
mod tests;

pub use error::StoreError;
pub use job::{Job, JobStatus};
pub use store::{NewJob, Store};
