//! The article persistence service: renders an item to a markdown document
//! and writes it through the content store, stamping the item's saved state
//! only after the write succeeds.

mod template;

pub use template::{
    derived_path, render_body, render_frontmatter, sanitize_filename,
    DEFAULT_FRONTMATTER_TEMPLATE,
};

use crate::config::Config;
use crate::content::{clean_html, ContentExtractor, MarkdownConverter};
use crate::model::Item;
use crate::store::{normalize_path, ContentStore, StoreError};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;

/// Errors from a single save operation. Any of these leaves the item's saved
/// state untouched — there are no partially saved items.
#[derive(Debug, Error)]
pub enum SaveError {
    /// Folder chain creation failed. The message names the exact segment,
    /// since that is directly actionable.
    #[error("Failed to create folder: {0}")]
    FolderCreate(String),

    /// The final write failed.
    #[error("Failed to write article to {path}: {source}")]
    Write {
        path: String,
        source: StoreError,
    },

    /// Pre-write store interaction (existence check, stale-file removal)
    /// failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Save-time behavior, lifted out of [`Config`] so the saver can be built
/// directly in tests.
#[derive(Debug, Clone)]
pub struct SaveSettings {
    pub default_folder: String,
    pub default_template: String,
    /// Empty string selects [`DEFAULT_FRONTMATTER_TEMPLATE`].
    pub frontmatter_template: String,
    pub include_frontmatter: bool,
    pub add_saved_tag: bool,
    pub saved_tag_color: String,
}

impl SaveSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            default_folder: config.default_folder.clone(),
            default_template: config.default_template.clone(),
            frontmatter_template: config.frontmatter_template.clone(),
            include_frontmatter: config.include_frontmatter,
            add_saved_tag: config.add_saved_tag,
            saved_tag_color: config.saved_tag_color.clone(),
        }
    }
}

impl Default for SaveSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Writes items into the content store as rendered markdown documents.
pub struct ArticleSaver<S> {
    store: Arc<S>,
    settings: SaveSettings,
    converter: Box<dyn MarkdownConverter>,
}

impl<S: ContentStore> ArticleSaver<S> {
    pub fn new(store: Arc<S>, settings: SaveSettings, converter: Box<dyn MarkdownConverter>) -> Self {
        Self {
            store,
            settings,
            converter,
        }
    }

    pub fn settings(&self) -> &SaveSettings {
        &self.settings
    }

    /// The deterministic path this saver would write `title` to with no
    /// explicit folder override.
    pub fn expected_path(&self, title: &str) -> String {
        derived_path(&self.settings.default_folder, title)
    }

    /// Save an item to the content store.
    ///
    /// Resolution order for the target folder: explicit argument, configured
    /// default, store root. An existing file at the derived path is deleted
    /// first — last write wins, no versioning.
    ///
    /// With `raw_content` (full-article markdown) the document is frontmatter
    /// (when configured) plus the content verbatim; otherwise the body
    /// template is rendered from feed-supplied fields.
    ///
    /// On success the item is stamped `saved = true`, `saved_file_path` is
    /// set, and the marker tag appended when configured. On failure the item
    /// is left exactly as it was.
    pub async fn save(
        &self,
        item: &mut Item,
        folder: Option<&str>,
        body_template: Option<&str>,
        raw_content: Option<&str>,
    ) -> Result<String, SaveError> {
        let folder = folder
            .map(str::to_string)
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| self.settings.default_folder.clone());
        let folder = normalize_path(&folder);

        if !folder.is_empty() {
            self.ensure_folder_chain(&folder).await?;
        }

        let path = derived_path(&folder, &item.title);

        // Collision policy: destructive overwrite
        if self.store.exists(&path).await? {
            tracing::debug!(path = %path, "Replacing existing saved article");
            self.store.remove(&path).await?;
        }

        let content = match raw_content {
            Some(raw) => {
                let mut doc = String::new();
                if self.settings.include_frontmatter {
                    let fm_template = if self.settings.frontmatter_template.trim().is_empty() {
                        DEFAULT_FRONTMATTER_TEMPLATE
                    } else {
                        &self.settings.frontmatter_template
                    };
                    doc.push_str(&render_frontmatter(
                        item,
                        fm_template,
                        self.settings.add_saved_tag,
                        Utc::now(),
                    ));
                }
                doc.push_str(raw);
                doc
            }
            None => {
                let body_template = body_template.unwrap_or(&self.settings.default_template);
                let markdown = self.converter.to_markdown(&clean_html(&item.description));
                render_body(item, body_template, &markdown, self.settings.add_saved_tag)
            }
        };

        if let Err(source) = self.store.create(&path, &content).await {
            return Err(SaveError::Write { path, source });
        }

        item.saved = true;
        item.saved_file_path = Some(path.clone());
        if self.settings.add_saved_tag {
            item.add_saved_tag(&self.settings.saved_tag_color);
        }
        tracing::info!(path = %path, guid = %item.guid, "Article saved");
        Ok(path)
    }

    /// Save with the extraction pipeline's full-article content when it
    /// yields anything, falling back to the template save on empty results.
    pub async fn save_with_full_content(
        &self,
        extractor: &ContentExtractor,
        item: &mut Item,
        folder: Option<&str>,
        body_template: Option<&str>,
    ) -> Result<String, SaveError> {
        let full = extractor.fetch_full_content(&item.link).await;
        if full.trim().is_empty() {
            tracing::debug!(link = %item.link, "No full content extracted, saving feed-supplied content");
            return self.save(item, folder, body_template, None).await;
        }

        let markdown = self.converter.to_markdown(&full);
        if markdown.trim().is_empty() {
            return self.save(item, folder, body_template, None).await;
        }
        self.save(item, folder, body_template, Some(&markdown)).await
    }

    /// Create every missing segment of `folder`, left to right, failing
    /// loudly on the first segment that cannot be created.
    async fn ensure_folder_chain(&self, folder: &str) -> Result<(), SaveError> {
        let mut current = String::new();
        for segment in folder.split('/').filter(|s| !s.is_empty()) {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(segment);

            let exists = self
                .store
                .exists(&current)
                .await
                .map_err(|_| SaveError::FolderCreate(current.clone()))?;
            if !exists {
                self.store
                    .ensure_folder(&current)
                    .await
                    .map_err(|_| SaveError::FolderCreate(current.clone()))?;
            }
        }
        Ok(())
    }
}
