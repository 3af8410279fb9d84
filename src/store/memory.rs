use super::adapter::{ContentStore, StoreError};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// In-memory content store.
///
/// The test double for `DirStore`, plus the external-mutation hooks
/// (`delete_externally`, `rename_externally`, `put`) that drift tests use to
/// simulate the user moving files around outside the engine's control.
/// Paths are plain map keys with no normalization or validation, so tests
/// can stage files at deliberately messy paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: Mutex<HashMap<String, String>>,
    folders: Mutex<HashSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a file's content, if present.
    pub fn read(&self, path: &str) -> Option<String> {
        self.files.lock().expect("store lock").get(path).cloned()
    }

    pub fn file_count(&self) -> usize {
        self.files.lock().expect("store lock").len()
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.files.lock().expect("store lock").keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Place a file directly, bypassing `create` semantics — simulates a file
    /// written by another tool using the same naming convention.
    pub fn put(&self, path: &str, content: &str) {
        self.files
            .lock()
            .expect("store lock")
            .insert(path.to_string(), content.to_string());
    }

    /// Delete a file behind the engine's back.
    pub fn delete_externally(&self, path: &str) -> bool {
        self.files.lock().expect("store lock").remove(path).is_some()
    }

    /// Rename a file behind the engine's back.
    pub fn rename_externally(&self, old_path: &str, new_path: &str) -> bool {
        let mut files = self.files.lock().expect("store lock");
        match files.remove(old_path) {
            Some(content) => {
                files.insert(new_path.to_string(), content);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn exists(&self, path: &str) -> Result<bool, StoreError> {
        let known_file = self.files.lock().expect("store lock").contains_key(path);
        let known_folder = self.folders.lock().expect("store lock").contains(path);
        Ok(known_file || known_folder)
    }

    async fn create(&self, path: &str, content: &str) -> Result<(), StoreError> {
        let mut files = self.files.lock().expect("store lock");
        if files.contains_key(path) {
            return Err(StoreError::AlreadyExists(path.to_string()));
        }
        files.insert(path.to_string(), content.to_string());
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        if self.files.lock().expect("store lock").remove(path).is_none() {
            return Err(StoreError::NotFound(path.to_string()));
        }
        Ok(())
    }

    async fn rename(&self, old_path: &str, new_path: &str) -> Result<(), StoreError> {
        if !self.rename_externally(old_path, new_path) {
            return Err(StoreError::NotFound(old_path.to_string()));
        }
        Ok(())
    }

    async fn ensure_folder(&self, path: &str) -> Result<(), StoreError> {
        self.folders.lock().expect("store lock").insert(path.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_and_external_delete() {
        let store = MemoryStore::new();
        store.create("a.md", "content").await.unwrap();
        assert!(store.exists("a.md").await.unwrap());

        assert!(store.delete_externally("a.md"));
        assert!(!store.exists("a.md").await.unwrap());
    }

    #[tokio::test]
    async fn create_rejects_existing() {
        let store = MemoryStore::new();
        store.create("a.md", "one").await.unwrap();
        assert!(matches!(
            store.create("a.md", "two").await,
            Err(StoreError::AlreadyExists(_))
        ));
        assert_eq!(store.read("a.md").as_deref(), Some("one"));
    }

    #[tokio::test]
    async fn rename_preserves_content() {
        let store = MemoryStore::new();
        store.create("a.md", "body").await.unwrap();
        store.rename("a.md", "b.md").await.unwrap();
        assert_eq!(store.read("b.md").as_deref(), Some("body"));
        assert!(store.read("a.md").is_none());
    }
}
