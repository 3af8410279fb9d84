//! Integration tests for the background import lifecycle: enqueue, drain,
//! failure policy, snapshot persistence, and the manual refresh path.
//!
//! Fetches are scripted; persistence goes through a real `SnapshotStore` in
//! a scratch directory so the on-disk round trip is exercised too.

use async_trait::async_trait;
use feedvault::config::ImportConfig;
use feedvault::feed::{FeedFetcher, FetchError, FetchedFeed};
use feedvault::import::{refresh_feed, ImportCoordinator};
use feedvault::model::{Feed, FeedDescriptor, ImportStatus, Item, MediaType};
use feedvault::registry::ItemRegistry;
use feedvault::store::SnapshotStore;
use std::path::PathBuf;
use std::sync::Mutex;

fn fast_config() -> ImportConfig {
    ImportConfig {
        inter_entry_delay_ms: 0,
        ..ImportConfig::default()
    }
}

fn scratch_snapshot(name: &str) -> SnapshotStore {
    let dir: PathBuf = std::env::temp_dir().join(format!("feedvault_it_import_{name}"));
    let _ = std::fs::remove_dir_all(&dir);
    SnapshotStore::new(dir.join("state.json"))
}

fn descriptor(title: &str, url: &str) -> FeedDescriptor {
    FeedDescriptor::new(title, url)
}

fn fetched_item(guid: &str, title: &str) -> Item {
    Item {
        guid: guid.to_string(),
        feed_url: String::new(),
        feed_title: String::new(),
        title: title.to_string(),
        link: format!("https://example.com/{guid}"),
        description: format!("<p>{title}</p>"),
        summary: None,
        author: None,
        pub_date: None,
        media_type: MediaType::Article,
        video_id: None,
        audio_url: None,
        read: false,
        starred: false,
        saved: false,
        saved_file_path: None,
        tags: Vec::new(),
    }
}

/// Fetcher with canned per-URL outcomes.
struct ScriptedFetcher {
    failing: Vec<String>,
    items_per_feed: usize,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    fn new(items_per_feed: usize) -> Self {
        Self {
            failing: Vec::new(),
            items_per_feed,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn failing_on(mut self, url: &str) -> Self {
        self.failing.push(url.to_string());
        self
    }
}

#[async_trait]
impl FeedFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str, _existing: Option<&Feed>) -> Result<FetchedFeed, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        if self.failing.iter().any(|f| f == url) {
            return Err(FetchError::Parse(format!("cannot parse {url}")));
        }
        Ok(FetchedFeed {
            title: Some(format!("Fetched {url}")),
            media_type: MediaType::Article,
            items: (0..self.items_per_feed)
                .map(|i| fetched_item(&format!("{url}-g{i}"), &format!("Item {i}")))
                .collect(),
        })
    }
}

#[tokio::test]
async fn bulk_import_populates_registry_and_snapshot() {
    let snapshot = scratch_snapshot("bulk");
    let mut registry = ItemRegistry::new();
    let mut coordinator = ImportCoordinator::new(fast_config());
    let fetcher = ScriptedFetcher::new(4);

    let planned = ImportCoordinator::plan(
        &registry,
        vec![
            descriptor("Alpha", "https://alpha.example/feed"),
            descriptor("Beta", "https://beta.example/feed"),
        ],
    );
    assert!(coordinator.enqueue(&mut registry, planned));
    let summary = coordinator
        .process_queue(&mut registry, &fetcher, &snapshot)
        .await;

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.completed, 2);
    assert_eq!(registry.item_count(), 8);

    // Fetched titles won, items were denormalized
    let alpha = registry.feed("https://alpha.example/feed").unwrap();
    assert_eq!(alpha.title, "Fetched https://alpha.example/feed");
    assert!(alpha
        .items
        .iter()
        .all(|i| i.feed_url == "https://alpha.example/feed"));

    // Snapshot on disk reflects the drained queue
    let reloaded = snapshot.load().unwrap();
    assert_eq!(reloaded.item_count(), 8);
    assert!(reloaded.contains("https://beta.example/feed"));

    let _ = std::fs::remove_dir_all(snapshot.path().parent().unwrap());
}

#[tokio::test]
async fn fifo_order_holds_across_successes_and_failures() {
    let snapshot = scratch_snapshot("fifo");
    let mut registry = ItemRegistry::new();
    let mut coordinator = ImportCoordinator::new(fast_config());
    let fetcher = ScriptedFetcher::new(1).failing_on("https://b.example/feed");

    coordinator.enqueue(
        &mut registry,
        vec![
            descriptor("A", "https://a.example/feed"),
            descriptor("B", "https://b.example/feed"),
            descriptor("C", "https://c.example/feed"),
        ],
    );
    let summary = coordinator
        .process_queue(&mut registry, &fetcher, &snapshot)
        .await;

    // A reaches a terminal state strictly before B starts, B before C
    assert_eq!(
        fetcher.calls.lock().unwrap().clone(),
        vec![
            "https://a.example/feed",
            "https://b.example/feed",
            "https://c.example/feed"
        ]
    );
    let statuses: Vec<ImportStatus> = summary.outcomes.iter().map(|o| o.status).collect();
    assert_eq!(
        statuses,
        vec![
            ImportStatus::Completed,
            ImportStatus::Failed,
            ImportStatus::Completed
        ]
    );

    let _ = std::fs::remove_dir_all(snapshot.path().parent().unwrap());
}

#[tokio::test]
async fn failed_import_leaves_feed_registered_for_manual_retry() {
    let snapshot = scratch_snapshot("retry");
    let mut registry = ItemRegistry::new();
    let mut coordinator = ImportCoordinator::new(fast_config());
    let fetcher = ScriptedFetcher::new(3).failing_on("https://flaky.example/feed");

    coordinator.enqueue(
        &mut registry,
        vec![descriptor("Flaky", "https://flaky.example/feed")],
    );
    let summary = coordinator
        .process_queue(&mut registry, &fetcher, &snapshot)
        .await;

    assert_eq!(summary.failed, 1);
    let outcome = &summary.outcomes[0];
    assert_eq!(outcome.status, ImportStatus::Failed);
    assert!(outcome.error.as_deref().unwrap().contains("cannot parse"));

    // Not silently dropped: still registered, zero items
    let feed = registry.feed("https://flaky.example/feed").unwrap();
    assert!(feed.items.is_empty());
    assert_eq!(feed.title, "Flaky");

    // Manual retry succeeds against a healthy fetcher
    let healthy = ScriptedFetcher::new(3);
    let count = refresh_feed(&mut registry, &healthy, "https://flaky.example/feed")
        .await
        .unwrap();
    assert_eq!(count, 3);
    assert_eq!(
        registry.feed("https://flaky.example/feed").unwrap().title,
        "Fetched https://flaky.example/feed"
    );

    let _ = std::fs::remove_dir_all(snapshot.path().parent().unwrap());
}

#[tokio::test]
async fn import_truncates_to_fifty_items_by_default() {
    let snapshot = scratch_snapshot("truncate");
    let mut registry = ItemRegistry::new();
    let mut coordinator = ImportCoordinator::new(fast_config());
    let fetcher = ScriptedFetcher::new(80);

    coordinator.enqueue(
        &mut registry,
        vec![descriptor("Big", "https://big.example/feed")],
    );
    coordinator
        .process_queue(&mut registry, &fetcher, &snapshot)
        .await;

    assert_eq!(registry.feed("https://big.example/feed").unwrap().items.len(), 50);

    let _ = std::fs::remove_dir_all(snapshot.path().parent().unwrap());
}

#[tokio::test]
async fn reimporting_known_urls_is_planned_away() {
    let snapshot = scratch_snapshot("replan");
    let mut registry = ItemRegistry::new();
    let mut coordinator = ImportCoordinator::new(fast_config());
    let fetcher = ScriptedFetcher::new(1);

    coordinator.enqueue(
        &mut registry,
        vec![descriptor("A", "https://a.example/feed")],
    );
    coordinator
        .process_queue(&mut registry, &fetcher, &snapshot)
        .await;

    // A second bulk import carrying the same URL plans to nothing
    let planned = ImportCoordinator::plan(
        &registry,
        vec![
            descriptor("A again", "https://a.example/feed"),
            descriptor("New", "https://new.example/feed"),
        ],
    );
    assert_eq!(planned.len(), 1);
    assert_eq!(planned[0].url, "https://new.example/feed");

    let _ = std::fs::remove_dir_all(snapshot.path().parent().unwrap());
}
