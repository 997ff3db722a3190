#![forbid(unsafe_code)]

//! aria2 JSON-RPC adapter for the [`dlq_engine_core::DownloadEngine`]
//! contract.

mod client;

pub use client::Aria2Client;
