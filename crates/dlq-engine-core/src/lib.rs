#![forbid(unsafe_code)]

//! Engine-agnostic download engine interfaces and DTOs shared across the
//! workspace. The orchestrator only ever talks to a [`DownloadEngine`]; the
//! concrete aria2 adapter lives in `dlq-aria2`.

pub mod error;
pub mod model;
pub mod service;

pub use error::EngineError;
pub use model::{EngineFile, EngineOptions, EngineStatus, TransferState};
pub use service::DownloadEngine;
