#![forbid(unsafe_code)]

//! `dlq`, the command-line client for the download queue daemon.

mod cli;
mod client;
mod commands;
mod output;

#[tokio::main]
async fn main() {
    std::process::exit(cli::run().await);
}
