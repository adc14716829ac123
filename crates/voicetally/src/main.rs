mod api;
mod board;
mod config;
mod daemon;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::mpsc;
use tracing::info;

use voicetally_core::{top_n, JsonFileStore, MemberId, Persistence, PresenceRegistry, Tracker};
use voicetally_logging::{init_tracing, LogFormat, Logger};

use crate::api::AppState;
use crate::board::MemberTime;
use crate::config::TallyConfig;
use crate::daemon::{Daemon, EVENT_QUEUE};

#[derive(Parser, Debug)]
#[command(
    name = "voicetally",
    about = "Tracks how long community members spend active in voice",
    version,
    author
)]
struct Cli {
    /// Path to config file (default: ./voicetally.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Time data file (overrides config)
    #[arg(long, global = true)]
    data_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the tracker daemon and its HTTP API
    Serve {
        /// Address to listen on
        #[arg(long)]
        bind: Option<String>,

        /// Log output format
        #[arg(long, value_enum)]
        log_format: Option<LogFormatChoice>,

        /// Log level filter (RUST_LOG takes precedence)
        #[arg(long)]
        log_level: Option<String>,
    },

    /// Show the leaderboard from the saved time data
    Show {
        /// Number of members to show
        #[arg(short = 'n', long)]
        top: Option<usize>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one member's saved time
    Member {
        /// Member id
        id: MemberId,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let working_dir = std::env::current_dir().context("Failed to get current directory")?;
    let config = TallyConfig::discover(cli.config.as_deref(), &working_dir)?;
    let data_file = cli.data_file.clone().unwrap_or_else(|| config.data_file());

    match cli.command {
        Command::Serve {
            bind,
            log_format,
            log_level,
        } => {
            let log_format = match log_format {
                Some(choice) => choice.into(),
                None => config.log_format()?,
            };
            let level = log_level.unwrap_or_else(|| config.log_level().to_string());
            let _guard = init_tracing(&level, log_format, config.log_dir.as_deref());

            let bind = bind.unwrap_or_else(|| config.bind().to_string());
            serve(&config, &data_file, &bind, log_format).await
        }
        Command::Show { top, json } => {
            let table = JsonFileStore::new(&data_file)
                .load()
                .with_context(|| format!("Failed to load {}", data_file.display()))?;
            let rows = top_n(&table, top.unwrap_or_else(|| config.top_size()));
            let entries = board::entries(rows, |m| m.to_string());

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                board::print_leaderboard(&entries);
            }
            Ok(())
        }
        Command::Member { id, json } => {
            let table = JsonFileStore::new(&data_file)
                .load()
                .with_context(|| format!("Failed to load {}", data_file.display()))?;
            let time = table
                .get(&id)
                .map(|d| MemberTime::new(id, id.to_string(), *d));

            match (time, json) {
                (Some(time), true) => println!("{}", serde_json::to_string_pretty(&time)?),
                (Some(time), false) => board::print_member(&time),
                (None, true) => println!("null"),
                (None, false) => println!("{}", board::not_seen(&id.to_string())),
            }
            Ok(())
        }
    }
}

async fn serve(config: &TallyConfig, data_file: &Path, bind: &str, log_format: LogFormat) -> Result<()> {
    let logger = Arc::new(Logger::new(log_format));
    let registry = Arc::new(PresenceRegistry::new());
    let persistence = Arc::new(JsonFileStore::new(data_file));

    let tracker = Tracker::open(registry.clone(), persistence, logger)
        .await
        .with_context(|| format!("Failed to load time data from {}", data_file.display()))?;
    tracker.reconcile().await?;

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind API server to {}", bind))?;
    info!(%bind, "API listening");

    let (tx, rx) = mpsc::channel(EVENT_QUEUE);
    let daemon = Daemon::new(
        tracker.clone(),
        rx,
        config.reset_period(),
        config.autosave_period,
    );
    let daemon = tokio::spawn(daemon.run());

    let router = api::create_router(AppState {
        tracker,
        registry,
        events: tx,
        top_size: config.top_size(),
    });

    // Dropping the router closes the event channel, which stops the daemon.
    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    let stopped = daemon.await.context("Daemon task panicked")?;
    served.context("API server error")?;
    stopped
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    eprintln!("\nShutting down...");
}
