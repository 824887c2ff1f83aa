//! [`Storage`] over a directory on the local filesystem (the vault root).

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::contract::{Entry, SourceFile, Storage, StorageError};

#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a `/`-separated storage path onto the filesystem. `..` and empty
    /// segments are dropped so nothing escapes the root.
    pub fn resolve(&self, path: &str) -> PathBuf {
        path.split('/')
            .filter(|s| !s.is_empty() && *s != "." && *s != "..")
            .fold(self.root.clone(), |acc, segment| acc.join(segment))
    }
}

fn child_path(folder: &str, name: &str) -> String {
    let folder = folder.trim_end_matches('/');
    if folder.is_empty() {
        name.to_string()
    } else {
        format!("{folder}/{name}")
    }
}

fn mtime_millis(metadata: &std::fs::Metadata) -> i64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

#[async_trait]
impl Storage for LocalStorage {
    async fn read(&self, path: &str) -> Result<String, StorageError> {
        let bytes = tokio::fs::read(self.resolve(path))
            .await
            .map_err(|e| StorageError::io(path, e))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn list(&self, folder: &str) -> Result<Vec<Entry>, StorageError> {
        let mut dir = tokio::fs::read_dir(self.resolve(folder))
            .await
            .map_err(|e| StorageError::io(folder, e))?;
        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(|e| StorageError::io(folder, e))? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = child_path(folder, &name);
            let metadata = entry.metadata().await.map_err(|e| StorageError::io(&path, e))?;
            if metadata.is_dir() {
                entries.push(Entry::Folder(path));
            } else if metadata.is_file() {
                entries.push(Entry::File(SourceFile::from_path(&path, mtime_millis(&metadata))));
            }
        }
        // read_dir order is platform dependent.
        entries.sort_by(|a, b| entry_path(a).cmp(entry_path(b)));
        Ok(entries)
    }

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        tokio::fs::try_exists(self.resolve(path))
            .await
            .map_err(|e| StorageError::io(path, e))
    }

    async fn create(&self, path: &str, content: &str) -> Result<(), StorageError> {
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.resolve(path))
            .await
            .map_err(|e| StorageError::io(path, e))?;
        file.write_all(content.as_bytes())
            .await
            .map_err(|e| StorageError::io(path, e))?;
        file.flush().await.map_err(|e| StorageError::io(path, e))
    }

    async fn modify(&self, path: &str, content: &str) -> Result<(), StorageError> {
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(self.resolve(path))
            .await
            .map_err(|e| StorageError::io(path, e))?;
        file.write_all(content.as_bytes())
            .await
            .map_err(|e| StorageError::io(path, e))?;
        file.flush().await.map_err(|e| StorageError::io(path, e))
    }

    async fn create_folder(&self, path: &str) -> Result<(), StorageError> {
        tokio::fs::create_dir(self.resolve(path))
            .await
            .map_err(|e| StorageError::io(path, e))
    }
}

fn entry_path(entry: &Entry) -> &str {
    match entry {
        Entry::File(file) => &file.path,
        Entry::Folder(path) => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn create_then_modify_round_trip() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        storage.create("a.md", "one").await.unwrap();
        assert!(matches!(
            storage.create("a.md", "two").await,
            Err(StorageError::AlreadyExists(_))
        ));
        storage.modify("a.md", "three").await.unwrap();
        assert_eq!(storage.read("a.md").await.unwrap(), "three");
    }

    #[tokio::test]
    async fn read_replaces_invalid_utf8() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("caf.yml"), b"name: caf\xe9\n").unwrap();
        let storage = LocalStorage::new(dir.path());
        assert_eq!(storage.read("caf.yml").await.unwrap(), "name: caf\u{fffd}\n");
    }

    #[tokio::test]
    async fn modify_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        assert!(matches!(
            storage.modify("nope.md", "x").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn list_is_immediate_children_only() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("in/nested")).unwrap();
        std::fs::write(dir.path().join("in/app.yml"), "services: {}").unwrap();
        std::fs::write(dir.path().join("in/nested/deep.tf"), "").unwrap();

        let storage = LocalStorage::new(dir.path());
        let entries = storage.list("in").await.unwrap();
        assert_eq!(entries.len(), 2);
        match &entries[0] {
            Entry::File(file) => {
                assert_eq!(file.path, "in/app.yml");
                assert!(file.mtime > 0);
            }
            other => panic!("expected file, got {other:?}"),
        }
        assert_eq!(entries[1], Entry::Folder("in/nested".into()));
    }

    #[tokio::test]
    async fn create_folder_twice_is_already_exists() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        storage.create_folder("Parsed").await.unwrap();
        assert!(storage.exists("Parsed").await.unwrap());
        assert!(matches!(
            storage.create_folder("Parsed").await,
            Err(StorageError::AlreadyExists(_))
        ));
    }

    #[test]
    fn resolve_stays_under_root() {
        let storage = LocalStorage::new("/vault");
        assert_eq!(storage.resolve("../etc/passwd"), PathBuf::from("/vault/etc/passwd"));
        assert_eq!(storage.resolve(""), PathBuf::from("/vault"));
    }
}
