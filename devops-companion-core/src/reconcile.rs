//! Output reconciler: create-or-update of generated documents.
//!
//! Existence is re-derived from storage on every call, so a document removed
//! by hand is simply created again on the next write.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};

use crate::contract::{Storage, StorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteAction {
    Created,
    Updated,
}

pub struct OutputReconciler<S> {
    storage: Arc<S>,
    /// Folders already confirmed to exist during this process lifetime.
    known_folders: Mutex<HashSet<String>>,
}

impl<S: Storage> OutputReconciler<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            storage,
            known_folders: Mutex::new(HashSet::new()),
        }
    }

    fn is_known(&self, folder: &str) -> bool {
        self.known_folders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(folder)
    }

    fn remember(&self, folder: &str) {
        self.known_folders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(folder.to_string());
    }

    /// Make sure every segment of `folder` exists.
    ///
    /// A folder that appears between the existence check and the create (a
    /// concurrent writer, a sync tool) counts as success.
    pub async fn ensure_folder(&self, folder: &str) -> Result<(), StorageError> {
        let mut current = String::new();
        for segment in folder.split('/').filter(|s| !s.is_empty()) {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(segment);

            if self.is_known(&current) {
                continue;
            }
            if self.storage.exists(&current).await? {
                self.remember(&current);
                continue;
            }
            match self.storage.create_folder(&current).await {
                Ok(()) => {
                    debug!(folder = %current, "[WRITE] Created folder");
                }
                Err(StorageError::AlreadyExists(_)) => {}
                Err(e) => {
                    if !self.storage.exists(&current).await.unwrap_or(false) {
                        return Err(e);
                    }
                    debug!(folder = %current, error = %e, "[WRITE] Folder create failed but folder exists");
                }
            }
            self.remember(&current);
        }
        Ok(())
    }

    /// Write `content` at `path`, modifying the existing document in place or
    /// creating it.
    pub async fn write(&self, path: &str, content: &str) -> Result<WriteAction, StorageError> {
        if let Some((parent, _)) = path.rsplit_once('/') {
            self.ensure_folder(parent).await?;
        }

        let action = if self.storage.exists(path).await? {
            self.storage.modify(path, content).await?;
            WriteAction::Updated
        } else {
            match self.storage.create(path, content).await {
                Ok(()) => WriteAction::Created,
                Err(StorageError::AlreadyExists(_)) => {
                    self.storage.modify(path, content).await?;
                    WriteAction::Updated
                }
                Err(e) => return Err(e),
            }
        };
        info!(path, ?action, "[WRITE] Document written");
        Ok(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::MockStorage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn creates_missing_folders_then_document() {
        let mut storage = MockStorage::new();
        storage.expect_exists().returning(|_| Ok(false));
        storage
            .expect_create_folder()
            .withf(|p| p == "Parsed" || p == "Parsed/Docker")
            .times(2)
            .returning(|_| Ok(()));
        storage
            .expect_create()
            .withf(|p, c| p == "Parsed/Docker/app.md" && c == "# doc")
            .times(1)
            .returning(|_, _| Ok(()));
        storage.expect_modify().never();

        let reconciler = OutputReconciler::new(Arc::new(storage));
        let action = reconciler.write("Parsed/Docker/app.md", "# doc").await.unwrap();
        assert_eq!(action, WriteAction::Created);
    }

    #[tokio::test]
    async fn existing_document_is_modified() {
        let mut storage = MockStorage::new();
        storage.expect_exists().returning(|_| Ok(true));
        storage.expect_create_folder().never();
        storage.expect_create().never();
        storage
            .expect_modify()
            .withf(|p, _| p == "Parsed/Terraform/main.md")
            .times(1)
            .returning(|_, _| Ok(()));

        let reconciler = OutputReconciler::new(Arc::new(storage));
        let action = reconciler.write("Parsed/Terraform/main.md", "x").await.unwrap();
        assert_eq!(action, WriteAction::Updated);
    }

    #[tokio::test]
    async fn known_folders_skip_storage_checks() {
        let folder_checks = Arc::new(AtomicUsize::new(0));
        let counter = folder_checks.clone();
        let mut storage = MockStorage::new();
        storage.expect_exists().returning(move |p| {
            if p.ends_with(".md") {
                Ok(false)
            } else {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            }
        });
        storage.expect_create().times(2).returning(|_, _| Ok(()));

        let reconciler = OutputReconciler::new(Arc::new(storage));
        reconciler.write("Parsed/General/a.md", "a").await.unwrap();
        reconciler.write("Parsed/General/b.md", "b").await.unwrap();
        assert_eq!(folder_checks.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn folder_race_counts_as_success() {
        let mut storage = MockStorage::new();
        let checks = AtomicUsize::new(0);
        storage
            .expect_exists()
            .withf(|p| p == "Parsed")
            .returning(move |_| Ok(checks.fetch_add(1, Ordering::SeqCst) > 0));
        storage
            .expect_create_folder()
            .times(1)
            .returning(|p| Err(StorageError::Other(format!("{p} is being synced"))));

        let reconciler = OutputReconciler::new(Arc::new(storage));
        reconciler.ensure_folder("Parsed").await.unwrap();
    }

    #[tokio::test]
    async fn already_exists_on_folder_create_is_success() {
        let mut storage = MockStorage::new();
        storage.expect_exists().returning(|_| Ok(false));
        storage
            .expect_create_folder()
            .returning(|p| Err(StorageError::AlreadyExists(p.to_string())));

        let reconciler = OutputReconciler::new(Arc::new(storage));
        reconciler.ensure_folder("Parsed/Docker").await.unwrap();
    }

    #[tokio::test]
    async fn create_race_falls_back_to_modify() {
        let mut storage = MockStorage::new();
        storage.expect_exists().returning(|p| Ok(p != "out/x.md"));
        storage
            .expect_create()
            .returning(|p, _| Err(StorageError::AlreadyExists(p.to_string())));
        storage.expect_modify().times(1).returning(|_, _| Ok(()));

        let reconciler = OutputReconciler::new(Arc::new(storage));
        assert_eq!(reconciler.write("out/x.md", "x").await.unwrap(), WriteAction::Updated);
    }

    #[tokio::test]
    async fn unrecoverable_folder_error_propagates() {
        let mut storage = MockStorage::new();
        storage.expect_exists().returning(|_| Ok(false));
        storage
            .expect_create_folder()
            .returning(|_| Err(StorageError::Other("read-only".into())));
        storage.expect_create().never();

        let reconciler = OutputReconciler::new(Arc::new(storage));
        assert!(reconciler.write("Parsed/x.md", "x").await.is_err());
    }
}
