//! Command-line front end for the event catalogue.
//!
//! Reads configuration from the environment (and `.env`), stores events in
//! SQLite and prints results as JSON or rendered chunks.

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use catalogue::{Catalogue, CatalogueConfig, RefreshJob, RefreshUpdate};
use database::Database;
use event_core::{
    decide, DeletionReason, Event, EventKey, EventUpdater, MessageInput, SystemClock,
};

const CHUNK_SEPARATOR: &str = "\n---\n";

#[derive(Debug, Parser)]
#[command(name = "catalogue")]
#[command(about = "Parse event announcements and render filtered event lists")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, clap::Args)]
struct MessageArgs {
    /// Channel id the message was posted in
    #[arg(long, allow_hyphen_values = true)]
    source_id: i64,

    /// Message id within the channel
    #[arg(long)]
    message_id: i64,
}

impl MessageArgs {
    fn key(&self) -> EventKey {
        EventKey::new(self.source_id, self.message_id)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parse a text without storing it and print the event and intent
    Parse {
        /// Text file to parse (defaults to stdin)
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Parse and store a new or edited message
    Ingest {
        #[command(flatten)]
        message: MessageArgs,

        /// Text file to parse (defaults to stdin)
        #[arg(long)]
        file: Option<PathBuf>,

        /// Treat the message as an edit of an existing one
        #[arg(long)]
        edit: bool,
    },

    /// Re-parse the stored text of an event
    Reparse {
        #[command(flatten)]
        message: MessageArgs,
    },

    /// Render the event list for filter tokens (e.g. `i w gr`)
    Render {
        /// Filter tokens; unknown tokens are ignored
        tokens: Vec<String>,
    },

    /// Hide an event from listings
    Delete {
        #[command(flatten)]
        message: MessageArgs,

        /// duplicate, not_an_event, expired or other
        #[arg(long, default_value = "other")]
        reason: String,
    },

    /// Bring a deleted event back
    Restore {
        #[command(flatten)]
        message: MessageArgs,
    },

    /// Render the configured lists once and print those that changed
    Refresh,

    /// Re-render the configured lists periodically
    Watch {
        /// Seconds between runs
        #[arg(long, default_value_t = 60)]
        interval_secs: u64,
    },
}

fn read_text(file: Option<&PathBuf>) -> io::Result<String> {
    match file {
        Some(path) => fs::read_to_string(path),
        None => {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text)?;
            Ok(text)
        }
    }
}

fn print_update(update: &RefreshUpdate) {
    println!("# {}", update.tokens.join(" "));
    println!("{}", update.chunks.join(CHUNK_SEPARATOR));
}

async fn open_catalogue(config: &CatalogueConfig) -> Result<Arc<Catalogue>, Box<dyn std::error::Error>> {
    let db = Database::connect(&config.database_url).await?;
    db.migrate().await?;
    Ok(Arc::new(Catalogue::new(Arc::new(db), config, Arc::new(SystemClock))))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let config = CatalogueConfig::from_env()?;

    match args.command {
        Command::Parse { file } => {
            let text = read_text(file.as_ref())?;
            let mut event = Event::new(EventKey::new(0, 0));
            let input = MessageInput::from_plain_text(text, Utc::now());
            let transition = EventUpdater::default().update(&mut event, &input, false, false);
            let intent = transition.map(|t| decide(&t, event.send_validity_notifications));
            let output = serde_json::json!({
                "event": event,
                "transition": transition,
                "intent": intent,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Ingest { message, file, edit } => {
            let text = read_text(file.as_ref())?;
            let catalogue = open_catalogue(&config).await?;
            let input = MessageInput::from_plain_text(text, Utc::now());
            let outcome = catalogue.handle_message(message.key(), &input, edit).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Reparse { message } => {
            let catalogue = open_catalogue(&config).await?;
            let outcome = catalogue.reparse(message.key()).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Render { tokens } => {
            let catalogue = open_catalogue(&config).await?;
            let chunks = catalogue.render(tokens.as_slice()).await?;
            println!("{}", chunks.join(CHUNK_SEPARATOR));
        }
        Command::Delete { message, reason } => {
            let reason: DeletionReason = reason.parse()?;
            let catalogue = open_catalogue(&config).await?;
            let event = catalogue.delete_event(message.key(), reason).await?;
            println!("{}", serde_json::to_string_pretty(&event)?);
        }
        Command::Restore { message } => {
            let catalogue = open_catalogue(&config).await?;
            let event = catalogue.restore_event(message.key()).await?;
            println!("{}", serde_json::to_string_pretty(&event)?);
        }
        Command::Refresh => {
            let catalogue = open_catalogue(&config).await?;
            let mut job = RefreshJob::new(catalogue, config.refresh_filters.clone());
            for update in job.run_once().await? {
                print_update(&update);
            }
        }
        Command::Watch { interval_secs } => {
            let catalogue = open_catalogue(&config).await?;
            let job = RefreshJob::new(catalogue, config.refresh_filters.clone());
            info!(
                "Watching {} event lists every {}s",
                config.refresh_filters.len(),
                interval_secs
            );
            tokio::select! {
                _ = job.run(Duration::from_secs(interval_secs.max(1)), |update| print_update(&update)) => {}
                _ = tokio::signal::ctrl_c() => info!("Shutting down"),
            }
        }
    }

    Ok(())
}
