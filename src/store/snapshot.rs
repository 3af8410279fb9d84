use crate::registry::ItemRegistry;
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Failed to read state snapshot: {0}")]
    Io(#[from] std::io::Error),

    #[error("State snapshot is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Snapshot write task failed: {0}")]
    Join(String),
}

/// Sink the import worker persists registry snapshots through.
///
/// The production implementation is [`SnapshotStore`]; tests substitute a
/// counting fake to assert the write cadence.
#[async_trait]
pub trait StatePersister: Send + Sync {
    async fn persist(&self, registry: &ItemRegistry) -> Result<(), SnapshotError>;
}

/// Whole-registry JSON snapshot on disk.
///
/// Writes go through a temp file, fsync, then an atomic rename so the
/// snapshot is never observable in a partial state. A missing snapshot file
/// loads as an empty registry.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<ItemRegistry, SnapshotError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No snapshot found, starting empty");
                return Ok(ItemRegistry::new());
            }
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(ItemRegistry::new());
        }
        let registry = serde_json::from_str(&content)?;
        Ok(registry)
    }
}

/// Write `content` to `path` via temp-file + fsync + rename.
///
/// The randomized temp suffix keeps concurrent writers (and symlink games)
/// from colliding on a predictable path.
fn atomic_write(path: &Path, content: &str) -> Result<(), SnapshotError> {
    use std::time::{SystemTime, UNIX_EPOCH};
    let random_suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = path.with_extension(format!("tmp.{:016x}", random_suffix));

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)?;

    if let Err(e) = file.write_all(content.as_bytes()) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e.into());
    }
    if let Err(e) = file.sync_all() {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e.into());
    }
    drop(file);

    if let Err(e) = std::fs::rename(&temp_path, path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e.into());
    }
    Ok(())
}

#[async_trait]
impl StatePersister for SnapshotStore {
    async fn persist(&self, registry: &ItemRegistry) -> Result<(), SnapshotError> {
        let json = serde_json::to_string_pretty(registry)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || atomic_write(&path, &json))
            .await
            .map_err(|e| SnapshotError::Join(e.to_string()))??;
        Ok(())
    }
}
