use super::adapter::{validate_path, ContentStore, StoreError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Filesystem-backed content store rooted at a directory.
///
/// Store paths map directly onto paths under the root; the root itself is
/// created lazily on the first write.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StoreError> {
        validate_path(path)?;
        Ok(self.root.join(path))
    }
}

#[async_trait]
impl ContentStore for DirStore {
    async fn exists(&self, path: &str) -> Result<bool, StoreError> {
        let full = self.resolve(path)?;
        Ok(tokio::fs::try_exists(&full).await?)
    }

    async fn create(&self, path: &str, content: &str) -> Result<(), StoreError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&full)
            .await
        {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StoreError::AlreadyExists(path.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        let full = self.resolve(path)?;
        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn rename(&self, old_path: &str, new_path: &str) -> Result<(), StoreError> {
        let old_full = self.resolve(old_path)?;
        let new_full = self.resolve(new_path)?;
        if !tokio::fs::try_exists(&old_full).await? {
            return Err(StoreError::NotFound(old_path.to_string()));
        }
        if let Some(parent) = new_full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::rename(&old_full, &new_full).await?;
        Ok(())
    }

    async fn ensure_folder(&self, path: &str) -> Result<(), StoreError> {
        let full = self.resolve(path)?;
        match tokio::fs::create_dir(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
            // Root may not exist yet on the very first folder of a chain
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tokio::fs::create_dir_all(&full).await?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
