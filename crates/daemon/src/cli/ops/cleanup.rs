use clap::Args;

use hoard_daemon::database::Catalog;
use hoard_daemon::pipeline::{cleanup, CleanupScope};
use hoard_daemon::state::StateError;
use hoard_daemon::CatalogError;

#[derive(Args, Debug, Clone)]
pub struct Cleanup {
    /// Which entries to forget
    #[arg(value_enum)]
    pub scope: CleanupScope,
}

#[derive(Debug, thiserror::Error)]
pub enum CleanupError {
    #[error("state error: {0}")]
    State(#[from] StateError),
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Cleanup {
    type Error = CleanupError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = ctx.state()?;
        let catalog = Catalog::open(&state.db_path).await?;

        let result = cleanup(&catalog, self.scope).await;
        catalog.close().await;

        Ok(result?.to_string())
    }
}
