use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use common::prelude::Identity;

use crate::database::{Catalog, OwnedEntry};

/// What one `new` run recorded
#[derive(Debug, Default)]
pub struct NewReport {
    pub added: Vec<OwnedEntry>,
    /// Files that could not be inspected or recorded, with the reason
    pub failed: Vec<(PathBuf, String)>,
}

/// Record every regular file directly inside `dir` as owned by `identity`.
///
/// Symlinks count as the file they point to; subdirectories and dangling
///  links are skipped. Paths are stored absolute, in file name order.
///  One file failing does not stop the others. Running this twice records
///  every file twice.
pub async fn new_entries(
    catalog: &Catalog,
    dir: &Path,
    identity: &Identity,
) -> Result<NewReport, NewError> {
    let dir = tokio::fs::canonicalize(dir)
        .await
        .map_err(|source| NewError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?;
    if !dir.is_dir() {
        return Err(NewError::NotADirectory(dir));
    }

    let read_dir_err = |source| NewError::ReadDir {
        path: dir.clone(),
        source,
    };
    let mut report = NewReport::default();
    let mut files: Vec<PathBuf> = Vec::new();
    let mut read_dir = tokio::fs::read_dir(&dir).await.map_err(read_dir_err)?;
    while let Some(entry) = read_dir.next_entry().await.map_err(read_dir_err)? {
        let path = entry.path();
        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => files.push(path),
            Ok(_) => tracing::debug!(path = %path.display(), "skipping non-file entry"),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "skipping dangling link")
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), "failed to inspect entry: {}", e);
                report.failed.push((path, e.to_string()));
            }
        }
    }
    files.sort();

    for path in files {
        match catalog.add_owned(identity, &path).await {
            Ok(entry) => report.added.push(entry),
            Err(e) => {
                tracing::warn!(path = %path.display(), "failed to record owned entry: {}", e);
                report.failed.push((path, e.to_string()));
            }
        }
    }

    tracing::info!(
        %identity,
        dir = %dir.display(),
        added = report.added.len(),
        failed = report.failed.len(),
        "owned entries recorded"
    );
    Ok(report)
}

#[derive(Debug, thiserror::Error)]
pub enum NewError {
    #[error("failed to read {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
}
