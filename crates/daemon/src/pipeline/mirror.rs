use std::fmt::{Debug, Display};
use std::path::Path;

use common::prelude::{DirectoryAdapter, DirectoryError, DirectoryService, Identity};

use crate::database::{Catalog, CatalogError, MirroredEntry};

/// Agree to back up `filename` as published by `identity`, saving it into `dest`.
///
/// The first directory entry with exactly that filename wins. Returns
///  `None`, leaving the catalog untouched, when there is no such entry.
///  Starts no transfer.
pub async fn mirror<D: DirectoryService>(
    catalog: &Catalog,
    directory: &DirectoryAdapter<D>,
    identity: &Identity,
    filename: &str,
    dest: &Path,
) -> Result<Option<MirroredEntry>, MirrorError<D::Error>> {
    let entries = directory
        .lookup(identity)
        .await
        .map_err(MirrorError::Directory)?;

    let Some(entry) = entries.into_iter().find(|entry| entry.filename == filename) else {
        tracing::info!(%identity, filename, "no matching directory entry");
        return Ok(None);
    };

    let dest = if dest.is_absolute() {
        dest.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(MirrorError::CurrentDir)?
            .join(dest)
    };

    let mirrored = catalog
        .add_mirrored(&entry.locator, identity, &dest, &entry.filename)
        .await?;
    Ok(Some(mirrored))
}

#[derive(Debug, thiserror::Error)]
pub enum MirrorError<E: Display + Debug> {
    #[error("{0}")]
    Directory(DirectoryError<E>),
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("failed to resolve the working directory: {0}")]
    CurrentDir(#[source] std::io::Error),
}
