//! Configuration file parser for the vault's config.toml.
//!
//! The config file is optional — a missing file yields `Config::default()`.
//! Unknown keys are silently ignored by serde, though we log a warning when
//! the file contains potential typos.
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Folder (store path) saved articles land in when no explicit folder is
    /// given at save time.
    pub default_folder: String,

    /// Body template used when no explicit template is given at save time.
    pub default_template: String,

    /// Frontmatter template prepended to full-content saves. Empty string
    /// selects the built-in template.
    pub frontmatter_template: String,

    /// Whether full-content saves get frontmatter at all.
    pub include_frontmatter: bool,

    /// Whether saving an item attaches the "saved" marker tag.
    pub add_saved_tag: bool,

    /// Color for the saved marker tag.
    pub saved_tag_color: String,

    /// Quiet window after the last observed external store modification
    /// before a debounced verification pass runs, in minutes.
    pub verify_debounce_minutes: u64,

    /// Background import worker tuning.
    pub import: ImportConfig,
}

/// Cadence knobs for the background import worker.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Snapshot the full state every N processed entries (plus once at drain).
    pub persist_every: usize,

    /// Emit a re-render notification every N processed entries (plus once at
    /// drain).
    pub render_every: usize,

    /// Fixed pause between queue entries, yielding to the host and spacing
    /// out remote fetches.
    pub inter_entry_delay_ms: u64,

    /// Hard cap on items kept per feed at import time.
    pub max_items: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_folder: "RSS Articles".to_string(),
            default_template: "# {{title}}\n\n{{content}}\n\n[Source]({{link}})".to_string(),
            frontmatter_template: String::new(),
            include_frontmatter: true,
            add_saved_tag: true,
            saved_tag_color: crate::model::SAVED_TAG_COLOR.to_string(),
            verify_debounce_minutes: 5,
            import: ImportConfig::default(),
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            persist_every: 5,
            render_every: 3,
            inter_entry_delay_ms: 100,
            max_items: 50,
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = [
                "default_folder",
                "default_template",
                "frontmatter_template",
                "include_frontmatter",
                "add_saved_tag",
                "saved_tag_color",
                "verify_debounce_minutes",
                "import",
            ];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            default_folder = %config.default_folder,
            "Loaded configuration"
        );
        Ok(config)
    }
}

// ============================================================================
// Tests
// ============================================================================
