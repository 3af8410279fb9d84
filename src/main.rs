use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use feedvault::config::Config;
use feedvault::content::{ContentExtractor, HtmdConverter};
use feedvault::feed::HttpFeedFetcher;
use feedvault::import::{refresh_feed, ImportCoordinator, ImportEvent};
use feedvault::model::FeedDescriptor;
use feedvault::reconcile::{ReconcileSettings, Reconciler};
use feedvault::registry::ItemRegistry;
use feedvault::saver::{ArticleSaver, SaveSettings};
use feedvault::store::{DirStore, SnapshotStore, StatePersister};

#[derive(Parser, Debug)]
#[command(
    name = "feedvault",
    about = "Feed ingestion and saved-article reconciliation for a markdown vault"
)]
struct Args {
    /// Vault directory articles are saved into
    #[arg(long, default_value = ".")]
    vault: PathBuf,

    /// Config file (default: <vault>/.feedvault/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// State snapshot file (default: <vault>/.feedvault/state.json)
    #[arg(long)]
    state: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import new feeds from a TOML descriptor list via the background queue
    Import {
        /// TOML file with a [[feeds]] table array (title, url, folder, ...)
        file: PathBuf,
    },
    /// Run a full reconciliation pass over saved articles
    Reconcile,
    /// Re-fetch one registered feed
    Refresh { url: String },
    /// Save one article into the vault
    Save {
        feed_url: String,
        guid: String,
        /// Fetch the full article content before saving
        #[arg(long)]
        full: bool,
        /// Target folder (overrides the configured default)
        #[arg(long)]
        folder: Option<String>,
    },
    /// List registered feeds and their items
    List {
        /// Only items currently saved in the vault
        #[arg(long)]
        saved: bool,
    },
}

/// Shape of the import descriptor file.
#[derive(Debug, Deserialize)]
struct ImportFile {
    feeds: Vec<FeedDescriptor>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let meta_dir = args.vault.join(".feedvault");
    let config_path = args.config.unwrap_or_else(|| meta_dir.join("config.toml"));
    let state_path = args.state.unwrap_or_else(|| meta_dir.join("state.json"));

    let config = Config::load(&config_path).context("Failed to load configuration")?;
    let snapshot = SnapshotStore::new(&state_path);
    let mut registry = snapshot.load().context("Failed to load state snapshot")?;

    let store = Arc::new(DirStore::new(&args.vault));
    let client = reqwest::Client::new();

    match args.command {
        Command::Import { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read feed list: {}", file.display()))?;
            let parsed: ImportFile =
                toml::from_str(&content).context("Feed list is not valid TOML")?;

            let planned = ImportCoordinator::plan(&registry, parsed.feeds);
            if planned.is_empty() {
                println!("No new feeds found in the import file.");
                return Ok(());
            }
            println!(
                "Importing {} feeds. Articles will be fetched in the background.",
                planned.len()
            );

            let (tx, mut rx) = mpsc::channel::<ImportEvent>(64);
            let printer = tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    match event {
                        ImportEvent::Progress {
                            processed,
                            total,
                            current_title,
                        } => {
                            println!("  Fetching articles: {processed}/{total} - {current_title}");
                        }
                        ImportEvent::Refresh => {}
                        ImportEvent::Completed { processed } => {
                            println!("Background import completed. Processed {processed} feeds.");
                        }
                    }
                }
            });

            let mut coordinator = ImportCoordinator::new(config.import.clone()).with_events(tx);
            let fetcher = HttpFeedFetcher::new(client);
            if coordinator.enqueue(&mut registry, planned) {
                let summary = coordinator
                    .process_queue(&mut registry, &fetcher, &snapshot)
                    .await;
                for outcome in summary.outcomes.iter().filter(|o| o.error.is_some()) {
                    println!(
                        "  Failed: {} ({})",
                        outcome.title,
                        outcome.error.as_deref().unwrap_or("unknown error")
                    );
                }
            }
            drop(coordinator);
            printer.await.context("Progress printer task failed")?;
        }

        Command::Reconcile => {
            let reconciler = Reconciler::new(
                store,
                ReconcileSettings::from_config(&config),
                Duration::from_secs(config.verify_debounce_minutes * 60),
            );
            let report = reconciler.startup_pass(&mut registry).await;
            println!(
                "Reconciled {} items: {} orphaned, {} adopted, {} normalized, {} relocated",
                registry.item_count(),
                report.orphaned,
                report.adopted,
                report.normalized,
                report.relocated
            );
            if report.has_changes() {
                snapshot
                    .persist(&registry)
                    .await
                    .context("Failed to persist state snapshot")?;
            }
        }

        Command::Refresh { url } => {
            let fetcher = HttpFeedFetcher::new(client);
            let count = refresh_feed(&mut registry, &fetcher, &url)
                .await
                .with_context(|| format!("Failed to refresh feed: {url}"))?;
            println!("Feed refreshed: {count} items");
            snapshot
                .persist(&registry)
                .await
                .context("Failed to persist state snapshot")?;
        }

        Command::Save {
            feed_url,
            guid,
            full,
            folder,
        } => {
            let saver = ArticleSaver::new(
                store,
                SaveSettings::from_config(&config),
                Box::new(HtmdConverter::new()),
            );
            let Some(item) = registry.item_mut(&feed_url, &guid) else {
                bail!("No item {guid} in feed {feed_url}");
            };

            let path = if full {
                let extractor = ContentExtractor::new(client);
                saver
                    .save_with_full_content(&extractor, item, folder.as_deref(), None)
                    .await?
            } else {
                saver.save(item, folder.as_deref(), None, None).await?
            };
            println!("Article saved: {path}");
            snapshot
                .persist(&registry)
                .await
                .context("Failed to persist state snapshot")?;
        }

        Command::List { saved } => {
            for feed in registry.feeds() {
                println!("{} <{}> — {} items", feed.title, feed.url, feed.items.len());
                for item in &feed.items {
                    if saved && !item.saved {
                        continue;
                    }
                    let marker = if item.saved { "*" } else { " " };
                    match &item.saved_file_path {
                        Some(path) => println!("  {marker} [{}] {} -> {path}", item.guid, item.title),
                        None => println!("  {marker} [{}] {}", item.guid, item.title),
                    }
                }
            }
        }
    }

    Ok(())
}
