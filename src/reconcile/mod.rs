//! Keeps the saved flag, the marker tag, and the on-disk file location
//! mutually consistent while users rename and delete files outside the
//! engine's control.
//!
//! All three passes are idempotent; a second run with no external changes is
//! a no-op. Store errors never flip item state — an item is only unsaved on
//! a definitive "file is not there" answer.

use crate::config::Config;
use crate::registry::ItemRegistry;
use crate::saver::derived_path;
use crate::store::{normalize_path, ContentStore, StoreError};
use futures::future::join_all;
use std::sync::Arc;
use tokio::time::{Duration, Instant};

/// External store change, delivered by the host (file watcher, vault events).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// Some file changed; exact target unknown. Arms the debounced
    /// verification timer.
    Modified,
    /// A file was deleted at this store path.
    Deleted(String),
    /// A file moved from one store path to another.
    Renamed { from: String, to: String },
}

/// What a reconciliation pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Items unsaved because their file is gone.
    pub orphaned: usize,
    /// Items marked saved because a file already sat at their expected path.
    pub adopted: usize,
    /// Stored paths silently swapped for their normalized form.
    pub normalized: usize,
    /// Files physically moved back under the configured folder.
    pub relocated: usize,
    /// Saved paths re-pointed after an external rename.
    pub repointed: usize,
}

impl ReconcileReport {
    pub fn has_changes(&self) -> bool {
        self.orphaned + self.adopted + self.normalized + self.relocated + self.repointed > 0
    }

    fn absorb(&mut self, other: ReconcileReport) {
        self.orphaned += other.orphaned;
        self.adopted += other.adopted;
        self.normalized += other.normalized;
        self.relocated += other.relocated;
        self.repointed += other.repointed;
    }
}

/// Reconciler-relevant slice of the configuration.
#[derive(Debug, Clone)]
pub struct ReconcileSettings {
    pub default_folder: String,
    pub add_saved_tag: bool,
    pub saved_tag_color: String,
}

impl ReconcileSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            default_folder: config.default_folder.clone(),
            add_saved_tag: config.add_saved_tag,
            saved_tag_color: config.saved_tag_color.clone(),
        }
    }
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

pub struct Reconciler<S> {
    store: Arc<S>,
    settings: ReconcileSettings,
    debounce: Duration,
    verify_after: Option<Instant>,
}

impl<S: ContentStore> Reconciler<S> {
    pub fn new(store: Arc<S>, settings: ReconcileSettings, debounce: Duration) -> Self {
        Self {
            store,
            settings,
            debounce,
            verify_after: None,
        }
    }

    /// Full startup reconciliation: path normalization repair, then
    /// verification, then adoption.
    pub async fn startup_pass(&self, registry: &mut ItemRegistry) -> ReconcileReport {
        let mut report = self.fix_paths(registry).await;
        report.absorb(self.full_pass(registry).await);
        report
    }

    /// Verification plus adoption — the pass run after rendering a
    /// saved-items view and when the debounce timer fires.
    pub async fn full_pass(&self, registry: &mut ItemRegistry) -> ReconcileReport {
        let mut report = self.verify(registry).await;
        report.absorb(self.adopt(registry).await);
        report
    }

    /// Repair stored paths whose recorded form differs from the normalized
    /// form.
    ///
    /// Per item with `saved` and a path: adopt the normalized path silently
    /// when a file is there; otherwise, if the file still answers at the
    /// recorded path, relocate it to the configured folder under the derived
    /// filename; if neither location has it, unsave the item.
    pub async fn fix_paths(&self, registry: &mut ItemRegistry) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        for item in registry.items_mut() {
            let Some(old_path) = item.saved_file_path.clone() else {
                continue;
            };
            if !item.saved {
                continue;
            }
            let normalized = normalize_path(&old_path);
            if normalized == old_path {
                continue;
            }

            match exists_lenient(self.store.as_ref(), &normalized).await {
                Some(true) => {
                    item.saved_file_path = Some(normalized);
                    report.normalized += 1;
                }
                Some(false) => match exists_lenient(self.store.as_ref(), &old_path).await {
                    Some(true) => {
                        let new_path = derived_path(&self.settings.default_folder, &item.title);
                        match self.store.rename(&old_path, &new_path).await {
                            Ok(()) => {
                                tracing::info!(
                                    from = %old_path,
                                    to = %new_path,
                                    "Relocated saved article to configured folder"
                                );
                                item.saved_file_path = Some(new_path);
                                report.relocated += 1;
                            }
                            Err(e) => {
                                tracing::warn!(
                                    from = %old_path,
                                    to = %new_path,
                                    error = %e,
                                    "Failed to relocate saved article"
                                );
                            }
                        }
                    }
                    Some(false) => {
                        tracing::debug!(
                            path = %old_path,
                            guid = %item.guid,
                            "Saved file gone from both paths, unsaving"
                        );
                        item.mark_unsaved();
                        report.orphaned += 1;
                    }
                    None => {}
                },
                None => {}
            }
        }
        report
    }

    /// Confirm every saved item's file still exists; unsave the ones whose
    /// file is gone. Existence checks fan out concurrently — items are
    /// independent and order carries no meaning.
    pub async fn verify(&self, registry: &mut ItemRegistry) -> ReconcileReport {
        let targets: Vec<(String, String, Option<String>)> = registry
            .items()
            .filter(|i| i.saved)
            .map(|i| (i.feed_url.clone(), i.guid.clone(), i.saved_file_path.clone()))
            .collect();

        let checks = targets.iter().map(|(_, _, path)| async move {
            match path {
                Some(p) => exists_lenient(self.store.as_ref(), p).await,
                // Saved flag without a path can't be backed by a file
                None => Some(false),
            }
        });
        let results = join_all(checks).await;

        let mut report = ReconcileReport::default();
        for ((feed_url, guid, _), exists) in targets.iter().zip(results) {
            if exists == Some(false) {
                if let Some(item) = registry.item_mut(feed_url, guid) {
                    tracing::debug!(guid = %guid, "Saved file missing, unsaving item");
                    item.mark_unsaved();
                    report.orphaned += 1;
                }
            }
        }
        report
    }

    /// Pick up files created out-of-band: any unsaved item whose expected
    /// deterministic path already holds a file becomes saved.
    pub async fn adopt(&self, registry: &mut ItemRegistry) -> ReconcileReport {
        let targets: Vec<(String, String, String)> = registry
            .items()
            .filter(|i| !i.saved)
            .map(|i| {
                (
                    i.feed_url.clone(),
                    i.guid.clone(),
                    derived_path(&self.settings.default_folder, &i.title),
                )
            })
            .collect();

        let checks = targets
            .iter()
            .map(|(_, _, path)| exists_lenient(self.store.as_ref(), path));
        let results = join_all(checks).await;

        let mut report = ReconcileReport::default();
        for ((feed_url, guid, path), exists) in targets.iter().zip(results) {
            if exists == Some(true) {
                if let Some(item) = registry.item_mut(feed_url, guid) {
                    tracing::debug!(guid = %guid, path = %path, "Adopting out-of-band saved file");
                    item.saved = true;
                    item.saved_file_path = Some(path.clone());
                    if self.settings.add_saved_tag {
                        item.add_saved_tag(&self.settings.saved_tag_color);
                    }
                    report.adopted += 1;
                }
            }
        }
        report
    }

    /// Deliver an external change notification.
    ///
    /// Deletions clean up exactly the affected items immediately; renames
    /// re-point `saved_file_path` without clearing `saved`; modifications
    /// (re-)arm the debounced verification timer.
    pub fn observe(&mut self, registry: &mut ItemRegistry, event: ChangeEvent) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        match event {
            ChangeEvent::Modified => {
                self.verify_after = Some(Instant::now() + self.debounce);
            }
            ChangeEvent::Deleted(path) => {
                for item in registry.items_mut() {
                    if item.saved && item.saved_file_path.as_deref() == Some(path.as_str()) {
                        item.mark_unsaved();
                        report.orphaned += 1;
                    }
                }
            }
            ChangeEvent::Renamed { from, to } => {
                for item in registry.items_mut() {
                    if item.saved && item.saved_file_path.as_deref() == Some(from.as_str()) {
                        item.saved_file_path = Some(to.clone());
                        report.repointed += 1;
                    }
                }
            }
        }
        report
    }

    /// True once the debounce quiet window has elapsed since the last
    /// observed modification.
    pub fn verification_due(&self) -> bool {
        self.verify_after.is_some_and(|t| Instant::now() >= t)
    }

    /// Run the debounced verification pass if it is due, clearing the timer.
    pub async fn run_due_verification(
        &mut self,
        registry: &mut ItemRegistry,
    ) -> Option<ReconcileReport> {
        if !self.verification_due() {
            return None;
        }
        self.verify_after = None;
        Some(self.full_pass(registry).await)
    }
}

/// Existence check that treats "this path can never exist here" as a
/// definitive no, and transient store failures as unknown (`None`) so
/// callers skip the item instead of flipping its state.
async fn exists_lenient<S: ContentStore>(store: &S, path: &str) -> Option<bool> {
    match store.exists(path).await {
        Ok(found) => Some(found),
        Err(StoreError::InvalidPath(_)) => Some(false),
        Err(e) => {
            tracing::warn!(path = %path, error = %e, "Existence check failed, leaving item untouched");
            None
        }
    }
}
