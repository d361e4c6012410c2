// EatLock - command line front end
// Composition root: config, device key, store and repository are wired
// here and passed down explicitly.

use anyhow::Context;
use chrono::{Duration as ChronoDuration, Utc};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use uuid::Uuid;

use eatlock::config::load_config;
use eatlock::feedback_engine::FeedbackEngine;
use eatlock::key_manager::KeyManager;
use eatlock::log_entry::{FeedbackState, LogCategory};
use eatlock::log_store::SledLogStore;
use eatlock::repository::LogRepository;
use eatlock::statistics::DateRange;

#[derive(Parser)]
#[command(name = "eatlock", about = "Encrypted eating-behavior journal")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record a new log entry
    Add {
        /// Entry text (500 characters max)
        text: String,
        /// Category: success, failure, struggle or other
        #[arg(long, default_value = "other")]
        category: String,
        /// Skip feedback generation
        #[arg(long)]
        no_feedback: bool,
    },
    /// List entries, newest first
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Show aggregate statistics
    Stats {
        /// Restrict to the last N days
        #[arg(long)]
        days: Option<i64>,
    },
    /// Generate feedback for entries still pending
    Feedback,
    /// Delete one entry
    Delete { id: String },
    /// Delete entries older than N days
    Prune {
        #[arg(long)]
        days: i64,
    },
    /// Classify text and print the feedback as JSON (debugging aid)
    Export { text: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config().context("loading configuration")?;
    let key = KeyManager::get_encryption_key().context("resolving device key")?;

    let store = Arc::new(SledLogStore::open(&config.data_dir).context("opening data store")?);
    let repository = LogRepository::with_limits(
        store,
        key,
        FeedbackEngine::new(),
        config.repository_limits(),
    );

    match cli.command {
        Command::Add {
            text,
            category,
            no_feedback,
        } => {
            let category: LogCategory = category.parse()?;
            let entry = if no_feedback {
                repository.create(&text, category).await?
            } else {
                repository.create_with_feedback(&text, category).await?
            };

            println!("recorded {}", entry.id);
            if let Some(feedback) = repository.get_secure_feedback(&entry).await {
                println!("feedback: {feedback}");
                if let Some(kcal) = entry.feedback.prevented_calories() {
                    println!("prevented: {kcal} kcal");
                }
            }
        }
        Command::List { limit } => {
            let entries = repository.list_entries().await?;
            for entry in entries.iter().take(limit) {
                let content = repository.get_secure_content(entry).await;
                let marker = match entry.feedback {
                    FeedbackState::Attached { .. } => "*",
                    _ => " ",
                };
                println!(
                    "{} {} [{:?}] {}",
                    entry.timestamp.format("%Y-%m-%d %H:%M"),
                    marker,
                    entry.category,
                    content
                );
            }
        }
        Command::Stats { days } => {
            let range = days.map(|n| DateRange {
                start: Utc::now() - ChronoDuration::days(n),
                end: Utc::now(),
            });
            let stats = repository.get_statistics(range).await?;
            println!("entries:            {}", stats.total_logs);
            println!("successes:          {}", stats.success_logs);
            println!("prevented calories: {} kcal", stats.total_prevented_calories);
            println!("consecutive days:   {}", stats.consecutive_days);
        }
        Command::Feedback => {
            let mut pending: Vec<_> = repository
                .list_entries()
                .await?
                .into_iter()
                .filter(|e| e.feedback == FeedbackState::Pending)
                .collect();
            if pending.is_empty() {
                println!("nothing pending");
            } else {
                let attached = repository.generate_feedback_batch(&mut pending).await?;
                println!("attached feedback to {attached} entries");
            }
        }
        Command::Delete { id } => {
            let id = Uuid::parse_str(&id).context("parsing entry id")?;
            let entry = repository.get_entry(&id).await?;
            repository.delete(&entry).await?;
            println!("deleted {id}");
        }
        Command::Prune { days } => {
            let cutoff = Utc::now() - ChronoDuration::days(days);
            let removed = repository.delete_older_than(cutoff).await?;
            println!("removed {removed} entries older than {days} days");
        }
        Command::Export { text } => {
            let result = FeedbackEngine::new()
                .classify(&text)
                .unwrap_or_else(|_| FeedbackEngine::fallback());
            let export = result.export(Utc::now());
            println!("{}", serde_json::to_string_pretty(&export)?);
        }
    }

    Ok(())
}
