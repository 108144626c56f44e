use std::path::PathBuf;

use clap::Args;

use common::prelude::Identity;
use hoard_daemon::database::Catalog;
use hoard_daemon::pipeline::{new_entries, NewError};
use hoard_daemon::state::StateError;
use hoard_daemon::CatalogError;

#[derive(Args, Debug, Clone)]
pub struct New {
    /// Directory whose files to offer
    pub directory: PathBuf,

    /// Identity to publish the files under
    pub identity: String,
}

#[derive(Debug, thiserror::Error)]
pub enum NewOpError {
    #[error("state error: {0}")]
    State(#[from] StateError),
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    New(#[from] NewError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for New {
    type Error = NewOpError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = ctx.state()?;
        let catalog = Catalog::open(&state.db_path).await?;

        let result = new_entries(&catalog, &self.directory, &Identity::new(self.identity.clone())).await;
        catalog.close().await;
        let report = result?;

        if report.added.is_empty() && report.failed.is_empty() {
            return Ok(format!("No files found in {}", self.directory.display()));
        }
        let added = report
            .added
            .iter()
            .map(|entry| format!("Added {}: {}", entry.filename, entry.path.display()));
        let failed = report
            .failed
            .iter()
            .map(|(path, reason)| format!("Failed to add {}: {}", path.display(), reason));
        Ok(added.chain(failed).collect::<Vec<_>>().join("\n"))
    }
}
