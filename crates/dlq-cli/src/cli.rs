//! Argument parsing and command dispatch.

use clap::{Args, Parser, Subcommand};

use crate::client::ApiClient;
use crate::commands;

/// Exit code contract: 0 on success, 1 on any per-item failure.
pub(crate) async fn run() -> i32 {
    let cli = Cli::parse();
    let client = match ApiClient::new(&cli.api) {
        Ok(client) => client,
        Err(err) => {
            eprintln!("error: {err:#}");
            return 1;
        }
    };
    let result = dispatch(cli.command, &client).await;
    match result {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {err:#}");
            1
        }
    }
}

async fn dispatch(command: Command, client: &ApiClient) -> anyhow::Result<()> {
    match command {
        Command::Add(args) => commands::add::run(client, args).await,
        Command::Status(args) => commands::jobs::status(client, args).await,
        Command::Files => commands::jobs::files(client).await,
        Command::Logs(args) => commands::jobs::logs(client, args).await,
        Command::Retry { id } => commands::jobs::action(client, id, "retry").await,
        Command::Remove { id } => commands::jobs::action(client, id, "remove").await,
        Command::Pause { id } => commands::jobs::action(client, id, "pause").await,
        Command::Resume { id } => commands::jobs::action(client, id, "resume").await,
        Command::Clear => commands::jobs::clear(client).await,
        Command::Purge => commands::jobs::purge(client).await,
        Command::Settings(args) => commands::settings::run(client, args).await,
        Command::Info => commands::info::run(client).await,
    }
}

#[derive(Parser)]
#[command(name = "dlq", version, about = "Client for the download queue daemon")]
pub(crate) struct Cli {
    /// Daemon API base URL.
    #[arg(long, global = true, env = "DLQ_API", default_value = "http://127.0.0.1:8099")]
    pub(crate) api: String,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Queue one or more URLs for download.
    Add(AddArgs),
    /// Show the job table.
    Status(StatusArgs),
    /// Show per-job output paths.
    Files,
    /// Show a job's event log.
    Logs(LogsArgs),
    /// Retry a failed or decrypt-failed job.
    Retry {
        /// Job id.
        id: i64,
    },
    /// Remove a job (soft delete).
    Remove {
        /// Job id.
        id: i64,
    },
    /// Pause a job.
    Pause {
        /// Job id.
        id: i64,
    },
    /// Resume a paused job.
    Resume {
        /// Job id.
        id: i64,
    },
    /// Clear finished jobs.
    Clear,
    /// Delete all jobs and their history.
    Purge,
    /// Show or change daemon settings.
    Settings(SettingsArgs),
    /// Show daemon metadata.
    Info,
}

#[derive(Args)]
pub(crate) struct AddArgs {
    /// URLs to queue.
    pub(crate) urls: Vec<String>,
    /// Read URLs from a file, one per line; `#` starts a comment.
    #[arg(long)]
    pub(crate) file: Option<String>,
    /// Read URLs from stdin, one per line; `#` starts a comment.
    #[arg(long)]
    pub(crate) stdin: bool,
    /// Output directory (must be under an allowed root).
    #[arg(long)]
    pub(crate) out: String,
    /// Output filename; only valid with a single URL.
    #[arg(long)]
    pub(crate) name: Option<String>,
    /// Explicit site tag.
    #[arg(long, value_parser = ["webshare", "mega", "http", "https"])]
    pub(crate) site: Option<String>,
    /// Password for archive extraction after download.
    #[arg(long)]
    pub(crate) archive_password: Option<String>,
    /// Retry ceiling for the new jobs.
    #[arg(long)]
    pub(crate) max_attempts: Option<i64>,
}

#[derive(Args)]
pub(crate) struct StatusArgs {
    /// Refresh until no job is active.
    #[arg(long)]
    pub(crate) watch: bool,
    /// Refresh interval in seconds.
    #[arg(long, default_value_t = 1)]
    pub(crate) interval: u64,
    /// Only show jobs in this status.
    #[arg(long)]
    pub(crate) status: Option<String>,
}

#[derive(Args)]
pub(crate) struct LogsArgs {
    /// Job id.
    pub(crate) id: i64,
    /// Only show the last N lines.
    #[arg(long)]
    pub(crate) tail: Option<i64>,
}

#[derive(Args, Default)]
pub(crate) struct SettingsArgs {
    /// Maximum concurrent downloads (1-10).
    #[arg(long)]
    pub(crate) concurrency: Option<u32>,
    /// Default retry ceiling for new jobs (1-20).
    #[arg(long)]
    pub(crate) max_attempts: Option<u32>,
    /// Extract downloaded archives automatically.
    #[arg(long)]
    pub(crate) auto_decrypt: Option<bool>,
}
