use clap::Args;

use common::prelude::{DirectoryAdapter, DirectoryError, Identity};
use hoard_daemon::http_server::{HttpDirectory, HttpDirectoryError};
use hoard_daemon::pipeline::{format_entries, lookup};
use hoard_daemon::state::StateError;

#[derive(Args, Debug, Clone)]
pub struct Lookup {
    /// Identity whose published files to list
    pub identity: String,
}

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("state error: {0}")]
    State(#[from] StateError),
    #[error("directory client error: {0}")]
    Client(#[from] HttpDirectoryError),
    #[error("{0}")]
    Directory(#[from] DirectoryError<HttpDirectoryError>),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Lookup {
    type Error = LookupError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = ctx.state()?;
        let directory = DirectoryAdapter::new(HttpDirectory::new(&state.directory_url(ctx.port)?)?);
        let identity = Identity::new(self.identity.clone());

        let entries = lookup(&directory, &identity).await?;
        Ok(format_entries(&identity, &entries))
    }
}
