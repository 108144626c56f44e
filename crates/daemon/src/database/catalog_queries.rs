use std::path::Path;

use sqlx::Row;

use common::prelude::{Identity, Locator};

use super::{Catalog, CatalogError, MirroredEntry, OwnedEntry};

impl Catalog {
    /// Record `path` as offered under `identity`, named after its last
    ///  component. Inserts a new row every time.
    pub async fn add_owned(
        &self,
        identity: &Identity,
        path: &Path,
    ) -> Result<OwnedEntry, CatalogError> {
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| CatalogError::NoFileName(path.to_path_buf()))?;
        let path_str = path.to_string_lossy().to_string();

        sqlx::query(
            r#"
            INSERT INTO saved (identity, path, filename)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(identity.as_str())
        .bind(&path_str)
        .bind(&filename)
        .execute(&**self)
        .await?;

        tracing::debug!(%identity, path = %path_str, "owned entry added");
        Ok(OwnedEntry {
            identity: identity.clone(),
            path: path.to_path_buf(),
            filename,
        })
    }

    /// Every owned entry, in insertion order
    pub async fn list_owned(&self) -> Result<Vec<OwnedEntry>, CatalogError> {
        let rows = sqlx::query(
            r#"
            SELECT identity, path, filename FROM saved
            ORDER BY rowid
            "#,
        )
        .fetch_all(&**self)
        .await?;

        Ok(rows
            .iter()
            .map(|r| OwnedEntry {
                identity: Identity::new(r.get::<String, _>("identity")),
                path: r.get::<String, _>("path").into(),
                filename: r.get("filename"),
            })
            .collect())
    }

    pub async fn add_mirrored(
        &self,
        locator: &Locator,
        identity: &Identity,
        path: &Path,
        filename: &str,
    ) -> Result<MirroredEntry, CatalogError> {
        sqlx::query(
            r#"
            INSERT INTO kept (locator, identity, path, filename)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(locator.as_str())
        .bind(identity.as_str())
        .bind(path.to_string_lossy().to_string())
        .bind(filename)
        .execute(&**self)
        .await?;

        tracing::debug!(%identity, %locator, filename, "mirrored entry added");
        Ok(MirroredEntry {
            locator: locator.clone(),
            identity: identity.clone(),
            path: path.to_path_buf(),
            filename: filename.to_string(),
        })
    }

    /// Every mirrored entry, in insertion order
    pub async fn list_mirrored(&self) -> Result<Vec<MirroredEntry>, CatalogError> {
        let rows = sqlx::query(
            r#"
            SELECT locator, identity, path, filename FROM kept
            ORDER BY rowid
            "#,
        )
        .fetch_all(&**self)
        .await?;

        Ok(rows
            .iter()
            .map(|r| MirroredEntry {
                locator: Locator::new(r.get::<String, _>("locator")),
                identity: Identity::new(r.get::<String, _>("identity")),
                path: r.get::<String, _>("path").into(),
                filename: r.get("filename"),
            })
            .collect())
    }

    /// Delete every owned entry, returning how many were removed
    pub async fn clear_owned(&self) -> Result<u64, CatalogError> {
        let result = sqlx::query("DELETE FROM saved").execute(&**self).await?;
        Ok(result.rows_affected())
    }

    /// Delete every mirrored entry, returning how many were removed
    pub async fn clear_mirrored(&self) -> Result<u64, CatalogError> {
        let result = sqlx::query("DELETE FROM kept").execute(&**self).await?;
        Ok(result.rows_affected())
    }
}
