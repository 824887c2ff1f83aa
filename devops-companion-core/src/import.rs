//! Copy local files into the scan folder and run the full pipeline on each.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing::{error, info};

use crate::contract::{Notifier, SourceFile, Storage, StorageError, Transport};
use crate::pipeline::{PipelineMode, ProcessOutcome, ProcessingCoordinator};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("could not read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} has no file name", .0.display())]
    NoFileName(PathBuf),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug)]
pub struct ImportedFile {
    pub source: PathBuf,
    /// Storage path the copy was written to.
    pub stored_path: String,
    pub outcome: ProcessOutcome,
}

#[derive(Debug, Default)]
pub struct ImportReport {
    pub imported: Vec<ImportedFile>,
    pub failed: Vec<(PathBuf, ImportError)>,
}

/// `name` with `-{n}` inserted before the extension: `app.yml` -> `app-1.yml`.
/// Dotfiles keep their name as the extension: `.env` -> `env-1.env`.
pub fn numbered_name(name: &str, n: usize) -> String {
    match name.rfind('.') {
        Some(0) => format!("{}-{n}{name}", &name[1..]),
        Some(idx) => format!("{}-{n}{}", &name[..idx], &name[idx..]),
        None => format!("{name}-{n}"),
    }
}

async fn free_path<S: Storage>(storage: &S, folder: &str, name: &str) -> Result<String, StorageError> {
    let mut candidate = format!("{folder}/{name}");
    let mut n = 1;
    while storage.exists(&candidate).await? {
        candidate = format!("{folder}/{}", numbered_name(name, n));
        n += 1;
    }
    Ok(candidate)
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

async fn import_one<S, N, T>(
    coordinator: &ProcessingCoordinator<S, N, T>,
    source: &Path,
) -> Result<ImportedFile, ImportError>
where
    S: Storage,
    N: Notifier,
    T: Transport,
{
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| ImportError::NoFileName(source.to_path_buf()))?;
    let bytes = tokio::fs::read(source).await.map_err(|e| ImportError::Read {
        path: source.to_path_buf(),
        source: e,
    })?;
    let content = String::from_utf8_lossy(&bytes);

    let storage = coordinator.storage();
    let folder = coordinator.config().scan_path.trim_end_matches('/');
    let stored_path = free_path(storage.as_ref(), folder, &name).await?;
    storage.create(&stored_path, &content).await?;
    info!(source = %source.display(), stored = %stored_path, "[IMPORT] Copied into scan folder");

    let file = SourceFile::from_path(&stored_path, now_millis());
    let outcome = coordinator.process(&file, PipelineMode::Full).await;
    Ok(ImportedFile {
        source: source.to_path_buf(),
        stored_path,
        outcome,
    })
}

/// Import `sources` one after the other. Only a scan folder that cannot be
/// created fails the whole call; per-file problems land in the report.
pub async fn import_files<S, N, T>(
    coordinator: &ProcessingCoordinator<S, N, T>,
    sources: &[PathBuf],
) -> Result<ImportReport, ImportError>
where
    S: Storage,
    N: Notifier,
    T: Transport,
{
    coordinator
        .reconciler()
        .ensure_folder(&coordinator.config().scan_path)
        .await?;

    let mut report = ImportReport::default();
    for source in sources {
        match import_one(coordinator, source).await {
            Ok(imported) => {
                let stored_name = imported.stored_path.rsplit('/').next().unwrap_or_default();
                coordinator
                    .notifier()
                    .notify(&format!("Imported file: {stored_name}"));
                report.imported.push(imported);
            }
            Err(e) => {
                error!(source = %source.display(), error = %e, "[IMPORT][ERROR] Import failed");
                coordinator
                    .notifier()
                    .notify(&format!("Import failed for {}: {e}", source.display()));
                report.failed.push((source.clone(), e));
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_names_keep_the_extension() {
        assert_eq!(numbered_name("app.yml", 1), "app-1.yml");
        assert_eq!(numbered_name("main.tf", 2), "main-2.tf");
        assert_eq!(numbered_name("archive.tar.gz", 1), "archive.tar-1.gz");
        assert_eq!(numbered_name("Dockerfile", 3), "Dockerfile-3");
        assert_eq!(numbered_name(".env", 1), "env-1.env");
    }
}
