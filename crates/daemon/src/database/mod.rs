mod catalog_queries;
mod models;

use std::ops::Deref;
use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

pub use models::{MirroredEntry, OwnedEntry};

/// Table holding owned entries
pub const SAVED_TABLE: &str = "saved";
/// Table holding mirrored entries
pub const KEPT_TABLE: &str = "kept";

/// Local record of the files this node offers (`saved`)
///  and the files it backs up for others (`kept`).
#[derive(Clone, Debug)]
pub struct Catalog(SqlitePool);

impl Catalog {
    /// Open (creating if needed) the catalog at `path`
    pub async fn open(path: &Path) -> Result<Self, CatalogError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(CatalogError::CreateDir)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(CatalogError::Unavailable)?;

        tracing::debug!(path = %path.display(), "catalog opened");
        Self::setup(pool).await
    }

    /// A catalog that lives as long as the returned handle.
    pub async fn in_memory() -> Result<Self, CatalogError> {
        let options = SqliteConnectOptions::new().filename(":memory:");

        // a single connection that never recycles, or the data goes with it
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(CatalogError::Unavailable)?;

        Self::setup(pool).await
    }

    async fn setup(pool: SqlitePool) -> Result<Self, CatalogError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS saved (
                identity TEXT NOT NULL,
                path TEXT NOT NULL,
                filename TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(CatalogError::Schema)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kept (
                locator TEXT NOT NULL,
                identity TEXT NOT NULL,
                path TEXT NOT NULL,
                filename TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(CatalogError::Schema)?;

        Ok(Self(pool))
    }

    /// Close every pooled connection. Queries fail afterwards.
    pub async fn close(&self) {
        self.0.close().await;
    }
}

impl Deref for Catalog {
    type Target = SqlitePool;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to create catalog directory: {0}")]
    CreateDir(#[source] std::io::Error),

    #[error("unable to open the catalog database: {0}")]
    Unavailable(#[source] sqlx::Error),

    #[error("failed to create catalog tables: {0}")]
    Schema(#[source] sqlx::Error),

    #[error("catalog query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("path has no file name: {0}")]
    NoFileName(std::path::PathBuf),
}
