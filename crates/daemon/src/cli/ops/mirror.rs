use std::path::PathBuf;

use clap::Args;

use common::prelude::{DirectoryAdapter, Identity};
use hoard_daemon::database::Catalog;
use hoard_daemon::http_server::{HttpDirectory, HttpDirectoryError};
use hoard_daemon::pipeline::{mirror, MirrorError};
use hoard_daemon::state::StateError;
use hoard_daemon::CatalogError;

#[derive(Args, Debug, Clone)]
pub struct Mirror {
    /// Identity that published the file
    pub identity: String,

    /// Exact file name as published
    pub filename: String,

    /// Directory to save the file into
    pub path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum MirrorOpError {
    #[error("state error: {0}")]
    State(#[from] StateError),
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("directory client error: {0}")]
    Client(#[from] HttpDirectoryError),
    #[error(transparent)]
    Mirror(#[from] MirrorError<HttpDirectoryError>),
    #[error("No file named '{filename}' found for identity '{identity}'")]
    NotFound { identity: String, filename: String },
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Mirror {
    type Error = MirrorOpError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = ctx.state()?;
        let directory = DirectoryAdapter::new(HttpDirectory::new(&state.directory_url(ctx.port)?)?);
        let catalog = Catalog::open(&state.db_path).await?;

        let result = mirror(
            &catalog,
            &directory,
            &Identity::new(self.identity.clone()),
            &self.filename,
            &self.path,
        )
        .await;
        catalog.close().await;

        match result? {
            Some(entry) => Ok(format!("Mirrored {}: {}", entry.filename, entry.locator)),
            None => Err(MirrorOpError::NotFound {
                identity: self.identity.clone(),
                filename: self.filename.clone(),
            }),
        }
    }
}
