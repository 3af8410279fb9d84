//! The item registry: the single owned collection of feeds and their items.
//!
//! Every consumer — the import worker, the reconciler, user-initiated save
//! and update actions — mutates items through this registry, addressed by
//! `(feed_url, guid)`. Nothing holds an independent copy of an item, so there
//! is no divergent state to re-merge. Exclusive access is enforced by the
//! `&mut` borrow; callers serialize through a single logical thread of
//! control.

use crate::model::{Feed, Item, Tag};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Partial mutation applied to a single item by `ItemRegistry::update_item`.
///
/// `None` fields are left untouched. `saved_file_path` is doubly optional so
/// a patch can distinguish "leave alone" from "clear".
#[derive(Debug, Clone, Default)]
pub struct ItemPatch {
    pub read: Option<bool>,
    pub starred: Option<bool>,
    pub saved: Option<bool>,
    pub saved_file_path: Option<Option<String>>,
    pub tags: Option<Vec<Tag>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemRegistry {
    feeds: Vec<Feed>,
}

impl ItemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_feeds(feeds: Vec<Feed>) -> Self {
        Self { feeds }
    }

    pub fn feeds(&self) -> &[Feed] {
        &self.feeds
    }

    pub fn feed(&self, url: &str) -> Option<&Feed> {
        self.feeds.iter().find(|f| f.url == url)
    }

    pub fn feed_mut(&mut self, url: &str) -> Option<&mut Feed> {
        self.feeds.iter_mut().find(|f| f.url == url)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.feeds.iter().any(|f| f.url == url)
    }

    /// Register a feed. Returns false (and leaves the registry unchanged) if a
    /// feed with the same URL already exists.
    pub fn register(&mut self, feed: Feed) -> bool {
        if self.contains(&feed.url) {
            return false;
        }
        self.feeds.push(feed);
        true
    }

    pub fn remove_feed(&mut self, url: &str) -> Option<Feed> {
        let idx = self.feeds.iter().position(|f| f.url == url)?;
        Some(self.feeds.remove(idx))
    }

    pub fn item(&self, feed_url: &str, guid: &str) -> Option<&Item> {
        self.feed(feed_url)?.items.iter().find(|i| i.guid == guid)
    }

    pub fn item_mut(&mut self, feed_url: &str, guid: &str) -> Option<&mut Item> {
        self.feed_mut(feed_url)?
            .items
            .iter_mut()
            .find(|i| i.guid == guid)
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.feeds.iter().flat_map(|f| f.items.iter())
    }

    pub fn items_mut(&mut self) -> impl Iterator<Item = &mut Item> {
        self.feeds.iter_mut().flat_map(|f| f.items.iter_mut())
    }

    pub fn item_count(&self) -> usize {
        self.feeds.iter().map(|f| f.items.len()).sum()
    }

    /// Apply a partial mutation to one item and return whether it was found.
    pub fn update_item(&mut self, feed_url: &str, guid: &str, patch: ItemPatch) -> bool {
        let Some(item) = self.item_mut(feed_url, guid) else {
            return false;
        };
        if let Some(read) = patch.read {
            item.read = read;
        }
        if let Some(starred) = patch.starred {
            item.starred = starred;
        }
        if let Some(saved) = patch.saved {
            item.saved = saved;
        }
        if let Some(path) = patch.saved_file_path {
            item.saved_file_path = path;
        }
        if let Some(tags) = patch.tags {
            item.tags = tags;
        }
        true
    }

    /// Rename a feed and rewrite the denormalized `feed_title` on its items.
    ///
    /// Feed URL is identity and never changes here.
    pub fn edit_feed(&mut self, url: &str, new_title: &str, new_folder: &str) -> bool {
        let Some(feed) = self.feed_mut(url) else {
            return false;
        };
        let title_changed = feed.title != new_title;
        feed.title = new_title.to_string();
        feed.folder = new_folder.to_string();
        if title_changed {
            for item in &mut feed.items {
                item.feed_title = new_title.to_string();
            }
        }
        true
    }

    /// Enforce per-feed retention limits across the registry.
    ///
    /// For each feed:
    /// - `max_items_limit` (when > 0): read items are always kept; unread
    ///   items are sorted newest-first and truncated so the total stays within
    ///   the limit.
    /// - `auto_delete_duration` (when > 0, in days): read items are kept;
    ///   unread items older than the cutoff (or with no publish date) are
    ///   dropped.
    ///
    /// Returns the number of feeds whose item list changed.
    pub fn apply_feed_limits(&mut self, now: DateTime<Utc>) -> usize {
        let mut updated = 0;
        for feed in &mut self.feeds {
            let original_count = feed.items.len();

            if feed.max_items_limit > 0 && feed.items.len() > feed.max_items_limit {
                let (read_items, mut unread): (Vec<Item>, Vec<Item>) =
                    feed.items.drain(..).partition(|i| i.read);
                unread.sort_by(|a, b| b.pub_date.cmp(&a.pub_date));
                let max_unread = feed.max_items_limit.saturating_sub(read_items.len());
                unread.truncate(max_unread);
                feed.items = read_items;
                feed.items.extend(unread);
            }

            if feed.auto_delete_duration > 0 {
                let cutoff = now - Duration::days(feed.auto_delete_duration);
                feed.items
                    .retain(|i| i.read || i.pub_date.is_some_and(|d| d > cutoff));
            }

            if feed.items.len() != original_count {
                updated += 1;
            }
        }
        updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MediaType;

    fn item(feed_url: &str, guid: &str) -> Item {
        Item {
            guid: guid.to_string(),
            feed_url: feed_url.to_string(),
            feed_title: "Feed".into(),
            title: format!("Item {guid}"),
            link: format!("https://example.com/{guid}"),
            description: String::new(),
            summary: None,
            author: None,
            pub_date: Some(Utc::now()),
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

    fn feed_with_items(url: &str, n: usize) -> Feed {
        let mut feed = Feed::empty("Feed", url, "");
        for i in 0..n {
            feed.items.push(item(url, &format!("g{i}")));
        }
        feed
    }

    #[test]
    fn register_rejects_duplicate_url() {
        let mut reg = ItemRegistry::new();
        assert!(reg.register(Feed::empty("A", "https://a.example/feed", "")));
        assert!(!reg.register(Feed::empty("A again", "https://a.example/feed", "")));
        assert_eq!(reg.feeds().len(), 1);
        assert_eq!(reg.feed("https://a.example/feed").unwrap().title, "A");
    }

    #[test]
    fn item_lookup_by_identity() {
        let mut reg = ItemRegistry::new();
        reg.register(feed_with_items("https://a.example/feed", 3));
        reg.register(feed_with_items("https://b.example/feed", 3));

        assert!(reg.item("https://a.example/feed", "g1").is_some());
        assert!(reg.item("https://a.example/feed", "missing").is_none());
        assert!(reg.item("https://missing.example/feed", "g1").is_none());
        assert_eq!(reg.item_count(), 6);
    }

    #[test]
    fn update_item_applies_partial_patch() {
        let mut reg = ItemRegistry::new();
        reg.register(feed_with_items("https://a.example/feed", 1));

        let ok = reg.update_item(
            "https://a.example/feed",
            "g0",
            ItemPatch {
                read: Some(true),
                ..Default::default()
            },
        );
        assert!(ok);

        let it = reg.item("https://a.example/feed", "g0").unwrap();
        assert!(it.read);
        assert!(!it.starred); // untouched
    }

    #[test]
    fn edit_feed_rewrites_denormalized_titles() {
        let mut reg = ItemRegistry::new();
        reg.register(feed_with_items("https://a.example/feed", 2));

        assert!(reg.edit_feed("https://a.example/feed", "Renamed", "Tech"));
        let feed = reg.feed("https://a.example/feed").unwrap();
        assert_eq!(feed.folder, "Tech");
        assert!(feed.items.iter().all(|i| i.feed_title == "Renamed"));
    }

    #[test]
    fn max_items_limit_keeps_read_and_newest_unread() {
        let mut reg = ItemRegistry::new();
        let mut feed = feed_with_items("https://a.example/feed", 6);
        feed.max_items_limit = 3;
        feed.items[0].read = true;
        // Stagger publish dates so "newest" is well defined
        for (i, it) in feed.items.iter_mut().enumerate() {
            it.pub_date = Some(Utc::now() - Duration::hours(i as i64));
        }
        reg.register(feed);

        let updated = reg.apply_feed_limits(Utc::now());
        assert_eq!(updated, 1);

        let feed = reg.feed("https://a.example/feed").unwrap();
        assert_eq!(feed.items.len(), 3);
        // The read item survives regardless of age
        assert!(feed.items.iter().any(|i| i.guid == "g0"));
        // Newest unread items (g1, g2) fill the remainder
        assert!(feed.items.iter().any(|i| i.guid == "g1"));
        assert!(feed.items.iter().any(|i| i.guid == "g2"));
    }

    #[test]
    fn auto_delete_prunes_old_unread_only() {
        let mut reg = ItemRegistry::new();
        let mut feed = feed_with_items("https://a.example/feed", 3);
        feed.auto_delete_duration = 7;
        feed.items[0].read = true;
        feed.items[0].pub_date = Some(Utc::now() - Duration::days(30));
        feed.items[1].pub_date = Some(Utc::now() - Duration::days(30));
        feed.items[2].pub_date = Some(Utc::now() - Duration::days(1));
        reg.register(feed);

        reg.apply_feed_limits(Utc::now());
        let feed = reg.feed("https://a.example/feed").unwrap();
        let guids: Vec<_> = feed.items.iter().map(|i| i.guid.as_str()).collect();
        assert!(guids.contains(&"g0")); // read, kept
        assert!(!guids.contains(&"g1")); // old unread, pruned
        assert!(guids.contains(&"g2")); // recent unread, kept
    }

    #[test]
    fn apply_feed_limits_is_idempotent() {
        let mut reg = ItemRegistry::new();
        let mut feed = feed_with_items("https://a.example/feed", 10);
        feed.max_items_limit = 4;
        reg.register(feed);

        assert_eq!(reg.apply_feed_limits(Utc::now()), 1);
        assert_eq!(reg.apply_feed_limits(Utc::now()), 0);
    }
}
