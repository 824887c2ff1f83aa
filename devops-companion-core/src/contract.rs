//! # contract: seams between the pipeline and the outside world
//!
//! This module defines the traits the pipeline consumes and the plain data
//! types that flow across them:
//!
//! - [`Storage`]: the hierarchical file store holding both the watched source
//!   files and the generated markdown documents (a vault, a directory tree).
//! - [`Notifier`]: user-facing, non-fatal notices (completion of a batch scan,
//!   a failed enrichment).
//! - [`Transport`]: a single HTTP exchange against an enrichment provider.
//!
//! ## Paths
//! Storage paths are `/`-separated strings relative to the store root
//! (`DevOpsImports/app.yml`, `Parsed/Docker/app.md`). The empty string is the
//! root itself. Implementations map them onto whatever medium they wrap.
//!
//! ## Mocking & Testing
//! Every trait is annotated for `mockall`; the generated `MockStorage`,
//! `MockNotifier` and `MockTransport` are exported under the
//! `test-export-mocks` feature so dependent crates can use them too.

use async_trait::async_trait;
use thiserror::Error;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

/// A file observed in storage. Identity is `path`; everything else is derived
/// from it except `mtime`, which the storage reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Full storage path, e.g. `DevOpsImports/app.yml`.
    pub path: String,
    /// Last path segment, e.g. `app.yml`.
    pub name: String,
    /// File name without its extension, e.g. `app`.
    pub basename: String,
    /// Lower-cased extension without the dot, empty when there is none.
    pub extension: String,
    /// Last modification time in milliseconds since the Unix epoch.
    pub mtime: i64,
}

impl SourceFile {
    pub fn from_path(path: &str, mtime: i64) -> Self {
        let name = path.rsplit('/').next().unwrap_or(path).to_string();
        let (basename, extension) = match name.rfind('.') {
            // Dotfiles such as `.env`: the whole name is the extension.
            Some(0) => (name[1..].to_string(), name[1..].to_ascii_lowercase()),
            Some(idx) => (name[..idx].to_string(), name[idx + 1..].to_ascii_lowercase()),
            None => (name.clone(), String::new()),
        };
        Self {
            path: path.to_string(),
            name,
            basename,
            extension,
            mtime,
        }
    }
}

/// One child of a listed folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    File(SourceFile),
    /// Full storage path of a sub-folder.
    Folder(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("i/o error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("storage error: {0}")]
    Other(String),
}

impl StorageError {
    pub fn io(path: &str, source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(path.to_string()),
            std::io::ErrorKind::AlreadyExists => StorageError::AlreadyExists(path.to_string()),
            _ => StorageError::Io {
                path: path.to_string(),
                source,
            },
        }
    }
}

/// Generic hierarchical file store.
///
/// All operations are asynchronous and fallible. `create` fails with
/// [`StorageError::AlreadyExists`] when a document is already present and
/// `modify` fails with [`StorageError::NotFound`] when it is not; callers
/// decide between the two (see [`crate::reconcile`]).
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read the full text content of a file. Invalid UTF-8 is replaced, not
    /// reported.
    async fn read(&self, path: &str) -> Result<String, StorageError>;

    /// List the immediate children of a folder (non-recursive).
    async fn list(&self, folder: &str) -> Result<Vec<Entry>, StorageError>;

    /// Whether a file or folder exists at `path`.
    async fn exists(&self, path: &str) -> Result<bool, StorageError>;

    /// Create a new document. Fails if one already exists.
    async fn create(&self, path: &str, content: &str) -> Result<(), StorageError>;

    /// Replace the content of an existing document, keeping its identity.
    async fn modify(&self, path: &str, content: &str) -> Result<(), StorageError>;

    /// Create a single folder. Fails if it already exists.
    async fn create_folder(&self, path: &str) -> Result<(), StorageError>;
}

/// Sink for user-facing notices. Passive logging goes through `tracing`;
/// this is only for messages a person is expected to see.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// A fully-built HTTP request. Built by a provider, sent by a [`Transport`].
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// JSON body; `None` for GET.
    pub body: Option<serde_json::Value>,
}

/// Raw HTTP response: status code and body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },
}

/// One HTTP round-trip. Implementations perform no retries.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpReply, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_file_splits_name_and_extension() {
        let file = SourceFile::from_path("DevOpsImports/stack/app.YML", 42);
        assert_eq!(file.name, "app.YML");
        assert_eq!(file.basename, "app");
        assert_eq!(file.extension, "yml");
        assert_eq!(file.mtime, 42);
    }

    #[test]
    fn source_file_without_extension() {
        let file = SourceFile::from_path("DevOpsImports/Dockerfile", 0);
        assert_eq!(file.basename, "Dockerfile");
        assert_eq!(file.extension, "");
    }

    #[test]
    fn dotfile_uses_name_as_extension() {
        let file = SourceFile::from_path(".env", 0);
        assert_eq!(file.name, ".env");
        assert_eq!(file.basename, "env");
        assert_eq!(file.extension, "env");
    }

    #[test]
    fn io_errors_map_to_storage_variants() {
        let err = StorageError::io("a", std::io::Error::from(std::io::ErrorKind::AlreadyExists));
        assert!(matches!(err, StorageError::AlreadyExists(p) if p == "a"));
        let err = StorageError::io("b", std::io::Error::from(std::io::ErrorKind::NotFound));
        assert!(matches!(err, StorageError::NotFound(p) if p == "b"));
    }
}
