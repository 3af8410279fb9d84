//! Background import of newly discovered feeds.
//!
//! A bulk import enqueues feed descriptors; a single worker loop drains the
//! queue strictly FIFO, fetching each feed and merging its items into the
//! registry without blocking the caller. Progress, persistence, and
//! re-render notifications are batched to bound write and render
//! amplification.

use crate::config::ImportConfig;
use crate::feed::FeedFetcher;
use crate::model::{FeedDescriptor, ImportStatus};
use crate::registry::ItemRegistry;
use crate::store::StatePersister;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Events the import worker publishes to its progress sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportEvent {
    /// Entry `processed` of `total` is about to be fetched.
    Progress {
        processed: usize,
        total: usize,
        current_title: String,
    },
    /// Enough entries landed that the view should re-render.
    Refresh,
    /// The queue drained (or the worker was aborted); `processed` entries
    /// reached a terminal state this run.
    Completed { processed: usize },
}

/// Terminal state of one processed queue entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryOutcome {
    pub url: String,
    pub title: String,
    pub status: ImportStatus,
    /// Set only when `status` is `Failed`.
    pub error: Option<String>,
}

/// Outcome of one `process_queue` run. `outcomes` is in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub processed: usize,
    pub completed: usize,
    pub failed: usize,
    pub aborted: bool,
    pub outcomes: Vec<EntryOutcome>,
}

/// Handle for aborting a running import between queue entries.
///
/// An in-flight fetch is allowed to finish; the abort takes effect at the
/// top of the next iteration.
#[derive(Debug, Clone, Default)]
pub struct ImportAbort(Arc<AtomicBool>);

impl ImportAbort {
    pub fn abort(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// The background import queue and its single worker loop.
///
/// An owned component: whoever holds the process-wide context owns one of
/// these and serializes access to it together with the registry. The
/// `processing` flag guards against a second loop — `enqueue` during an
/// active run only appends, relying on the running loop to observe the new
/// entries before it drains.
pub struct ImportCoordinator {
    queue: VecDeque<FeedDescriptor>,
    processing: bool,
    config: ImportConfig,
    events: Option<mpsc::Sender<ImportEvent>>,
    abort: ImportAbort,
}

impl ImportCoordinator {
    pub fn new(config: ImportConfig) -> Self {
        Self {
            queue: VecDeque::new(),
            processing: false,
            config,
            events: None,
            abort: ImportAbort::default(),
        }
    }

    /// Attach a progress sink. Send failures are ignored — progress is
    /// best-effort and must never stall the worker.
    pub fn with_events(mut self, events: mpsc::Sender<ImportEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn abort_handle(&self) -> ImportAbort {
        self.abort.clone()
    }

    pub fn is_importing(&self) -> bool {
        self.processing
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Keep only descriptors for feeds not already registered by URL —
    /// the discovery step of a bulk import.
    pub fn plan(registry: &ItemRegistry, candidates: Vec<FeedDescriptor>) -> Vec<FeedDescriptor> {
        candidates
            .into_iter()
            .filter(|d| !registry.contains(&d.url))
            .collect()
    }

    /// Append descriptors to the queue tail, eagerly registering each feed
    /// with an empty item list so it is visible in the registry during the
    /// import.
    ///
    /// Returns true when the caller should start the worker (`process_queue`)
    /// because no loop is currently active.
    pub fn enqueue(
        &mut self,
        registry: &mut ItemRegistry,
        descriptors: Vec<FeedDescriptor>,
    ) -> bool {
        for descriptor in descriptors {
            if !registry.contains(&descriptor.url) {
                registry.register(descriptor.to_feed());
            }
            self.queue.push_back(descriptor);
        }
        !self.processing && !self.queue.is_empty()
    }

    /// Drain the queue: the single worker loop.
    ///
    /// Entries are processed strictly FIFO. Each entry transitions
    /// pending → processing → {completed | failed} exactly once and is then
    /// discarded; a failed fetch records its error on the entry and leaves
    /// the feed registered with whatever items it already had. State is
    /// persisted every `persist_every` entries and once at drain; a refresh
    /// notification goes out every `render_every` entries and once at drain.
    /// A fixed delay separates entries regardless of outcome.
    pub async fn process_queue(
        &mut self,
        registry: &mut ItemRegistry,
        fetcher: &dyn FeedFetcher,
        persister: &dyn StatePersister,
    ) -> ImportSummary {
        let mut summary = ImportSummary::default();
        if self.processing || self.queue.is_empty() {
            return summary;
        }
        self.processing = true;

        let total = self.queue.len();

        loop {
            if self.abort.is_aborted() {
                tracing::info!(
                    remaining = self.queue.len(),
                    "Background import aborted between entries"
                );
                summary.aborted = true;
                break;
            }
            let Some(mut descriptor) = self.queue.pop_front() else {
                break;
            };

            descriptor.import_status = ImportStatus::Processing;
            self.emit(ImportEvent::Progress {
                processed: summary.processed,
                total,
                current_title: descriptor.title.clone(),
            })
            .await;

            match fetcher.fetch(&descriptor.url, registry.feed(&descriptor.url)).await {
                Ok(fetched) => {
                    let max_items = self.config.max_items;
                    if let Some(feed) = registry.feed_mut(&descriptor.url) {
                        // Fetched title wins when the feed declares one
                        if let Some(title) = fetched.title.filter(|t| !t.trim().is_empty()) {
                            feed.title = title;
                        }
                        let mut items = fetched.items;
                        items.truncate(max_items);
                        for item in &mut items {
                            item.feed_url = feed.url.clone();
                            item.feed_title = feed.title.clone();
                        }
                        feed.items = items;
                        feed.last_updated = Utc::now();
                        feed.media_type = fetched.media_type;
                        tracing::debug!(
                            url = %feed.url,
                            items = feed.items.len(),
                            "Imported feed"
                        );
                    } else {
                        tracing::warn!(
                            url = %descriptor.url,
                            "Feed missing from registry during import"
                        );
                    }
                    descriptor.import_status = ImportStatus::Completed;
                    summary.completed += 1;
                }
                Err(e) => {
                    descriptor.import_status = ImportStatus::Failed;
                    descriptor.import_error = Some(e.to_string());
                    summary.failed += 1;
                    tracing::warn!(
                        url = %descriptor.url,
                        title = %descriptor.title,
                        error = %e,
                        "Feed import failed; feed stays registered without items"
                    );
                }
            }
            summary.processed += 1;
            summary.outcomes.push(EntryOutcome {
                url: descriptor.url.clone(),
                title: descriptor.title.clone(),
                status: descriptor.import_status,
                error: descriptor.import_error.clone(),
            });

            let persist_every = self.config.persist_every.max(1);
            if summary.processed % persist_every == 0 {
                self.persist(registry, persister).await;
            }
            let render_every = self.config.render_every.max(1);
            if summary.processed % render_every == 0 {
                self.emit(ImportEvent::Refresh).await;
            }

            // Yield to the host and avoid hammering remote hosts back-to-back
            tokio::time::sleep(Duration::from_millis(self.config.inter_entry_delay_ms)).await;
        }

        self.persist(registry, persister).await;
        self.emit(ImportEvent::Refresh).await;
        self.processing = false;
        // A consumed abort must not poison the next run
        self.abort.reset();
        self.emit(ImportEvent::Completed {
            processed: summary.processed,
        })
        .await;
        tracing::info!(
            processed = summary.processed,
            completed = summary.completed,
            failed = summary.failed,
            "Background import finished"
        );
        summary
    }

    async fn emit(&self, event: ImportEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event).await;
        }
    }

    async fn persist(&self, registry: &ItemRegistry, persister: &dyn StatePersister) {
        if let Err(e) = persister.persist(registry).await {
            tracing::warn!(error = %e, "Failed to persist state snapshot during import");
        }
    }
}

/// Re-fetch one already-registered feed — the manual retry / refresh path.
///
/// Items are replaced with the fetched set (truncated to the feed's own
/// `max_items_limit`), but mutable per-item state (read/starred/saved/tags)
/// carries over for items whose guid survives the refresh.
pub async fn refresh_feed(
    registry: &mut ItemRegistry,
    fetcher: &dyn FeedFetcher,
    url: &str,
) -> Result<usize, crate::feed::FetchError> {
    let fetched = fetcher.fetch(url, registry.feed(url)).await?;

    let Some(feed) = registry.feed_mut(url) else {
        return Ok(0);
    };

    let old_items = std::mem::take(&mut feed.items);
    if let Some(title) = fetched.title.filter(|t| !t.trim().is_empty()) {
        feed.title = title;
    }

    let mut items = fetched.items;
    if feed.max_items_limit > 0 {
        items.truncate(feed.max_items_limit);
    }
    for item in &mut items {
        item.feed_url = feed.url.clone();
        item.feed_title = feed.title.clone();
        if let Some(old) = old_items.iter().find(|o| o.guid == item.guid) {
            item.read = old.read;
            item.starred = old.starred;
            item.saved = old.saved;
            item.saved_file_path = old.saved_file_path.clone();
            item.tags = old.tags.clone();
        }
    }
    feed.items = items;
    feed.last_updated = Utc::now();
    feed.media_type = fetched.media_type;

    Ok(registry.feed(url).map_or(0, |f| f.items.len()))
}
