use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Tags
// ============================================================================

/// Name of the reserved marker tag attached to saved items.
///
/// Comparison against this name is always case-insensitive; all other tag
/// names compare case-sensitively.
pub const SAVED_TAG: &str = "saved";

/// Default color for the saved marker tag when none is configured.
pub const SAVED_TAG_COLOR: &str = "#3498db";

/// A user-visible label attached to an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub color: String,
}

impl Tag {
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
        }
    }

    /// True if this is the reserved saved marker (case-insensitive).
    pub fn is_saved_marker(&self) -> bool {
        self.name.eq_ignore_ascii_case(SAVED_TAG)
    }
}

// ============================================================================
// Media
// ============================================================================

/// Kind of content a feed (or item) carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Article,
    Video,
    Podcast,
}

// ============================================================================
// Items
// ============================================================================

/// A single syndicated content entry (article, video, or podcast episode).
///
/// Identity is `(feed_url, guid)`; both are immutable once the item exists.
/// Content fields are set at fetch time and not touched by the reconciliation
/// engine, except `feed_title`/`feed_url` which are denormalized for display.
///
/// Invariant (eventually consistent, repaired by the reconciler within one
/// pass): `saved == true` iff `saved_file_path` is set and a file exists at
/// that path in the content store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub guid: String,
    pub feed_url: String,
    pub feed_title: String,
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub pub_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub media_type: MediaType,
    #[serde(default)]
    pub video_id: Option<String>,
    #[serde(default)]
    pub audio_url: Option<String>,

    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub starred: bool,
    #[serde(default)]
    pub saved: bool,
    #[serde(default)]
    pub saved_file_path: Option<String>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

impl Item {
    /// True if the saved marker tag is present (case-insensitive match).
    pub fn has_saved_tag(&self) -> bool {
        self.tags.iter().any(Tag::is_saved_marker)
    }

    /// Append the saved marker tag unless one is already present.
    pub fn add_saved_tag(&mut self, color: &str) {
        if !self.has_saved_tag() {
            self.tags.push(Tag::new(SAVED_TAG, color));
        }
    }

    /// Remove every saved marker tag, leaving all other tags untouched.
    pub fn strip_saved_tag(&mut self) {
        self.tags.retain(|t| !t.is_saved_marker());
    }

    /// Append a tag unless a tag of the same name exists (tags are an ordered
    /// set, unique by name).
    pub fn add_tag(&mut self, tag: Tag) {
        if !self.tags.iter().any(|t| t.name == tag.name) {
            self.tags.push(tag);
        }
    }

    /// Clear the saved state: flag, path, and marker tag.
    pub fn mark_unsaved(&mut self) {
        self.saved = false;
        self.saved_file_path = None;
        self.strip_saved_tag();
    }
}

// ============================================================================
// Feeds
// ============================================================================

/// A named remote source owning an ordered sequence of items.
///
/// Item order is most-recent-fetch order, not necessarily chronological.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feed {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub folder: String,
    #[serde(default)]
    pub items: Vec<Item>,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub media_type: MediaType,
    /// Days after which unread items are pruned. 0 = off.
    #[serde(default)]
    pub auto_delete_duration: i64,
    /// Maximum items retained on refresh. 0 = unlimited.
    #[serde(default = "default_max_items")]
    pub max_items_limit: usize,
    /// Per-feed scan interval in minutes. 0 = use the global default.
    #[serde(default)]
    pub scan_interval: u64,
}

pub(crate) fn default_max_items() -> usize {
    50
}

impl Feed {
    /// A freshly registered feed with no items yet.
    pub fn empty(title: impl Into<String>, url: impl Into<String>, folder: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            folder: folder.into(),
            items: Vec::new(),
            last_updated: Utc::now(),
            media_type: MediaType::Article,
            auto_delete_duration: 0,
            max_items_limit: default_max_items(),
            scan_interval: 0,
        }
    }
}

// ============================================================================
// Import queue entries
// ============================================================================

/// Lifecycle state of a background import queue entry.
///
/// Transitions pending → processing → {completed | failed} exactly once; the
/// entry is discarded after reaching a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// A newly discovered feed awaiting background import.
///
/// Created when a bulk import finds a feed not already registered by URL.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedDescriptor {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub folder: String,
    #[serde(default)]
    pub media_type: MediaType,
    #[serde(default)]
    pub auto_delete_duration: i64,
    #[serde(default = "default_max_items")]
    pub max_items_limit: usize,
    #[serde(default)]
    pub scan_interval: u64,
    #[serde(skip, default = "pending_status")]
    pub import_status: ImportStatus,
    /// Set only when `import_status` is `Failed`.
    #[serde(skip)]
    pub import_error: Option<String>,
}

fn pending_status() -> ImportStatus {
    ImportStatus::Pending
}

impl FeedDescriptor {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            folder: String::new(),
            media_type: MediaType::Article,
            auto_delete_duration: 0,
            max_items_limit: default_max_items(),
            scan_interval: 0,
            import_status: ImportStatus::Pending,
            import_error: None,
        }
    }

    /// The feed registry record this descriptor registers at enqueue time.
    pub fn to_feed(&self) -> Feed {
        Feed {
            title: self.title.clone(),
            url: self.url.clone(),
            folder: self.folder.clone(),
            items: Vec::new(),
            last_updated: Utc::now(),
            media_type: self.media_type,
            auto_delete_duration: self.auto_delete_duration,
            max_items_limit: self.max_items_limit,
            scan_interval: self.scan_interval,
        }
    }
}
