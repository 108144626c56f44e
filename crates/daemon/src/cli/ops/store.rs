use clap::Args;

use common::prelude::{BlobSwarm, MonitorOutcome};
use hoard_daemon::http_server::HttpDirectory;
use hoard_daemon::pipeline::{store, NodeSession, PipelineError, SessionError};
use hoard_daemon::process::graceful_shutdown_blocker;
use hoard_daemon::state::StateError;

#[derive(Args, Debug, Clone)]
pub struct Store;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("state error: {0}")]
    State(#[from] StateError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError<HttpDirectory, BlobSwarm>),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Store {
    type Error = StoreError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = ctx.state()?;
        let mut session = NodeSession::connect(&state, ctx.port).await?;
        let (signal_handle, _shutdown_tx, mut shutdown_rx) = graceful_shutdown_blocker();

        let mut stdout = std::io::stdout();
        let result = store(&mut session, &mut shutdown_rx, &mut stdout).await;
        session.close().await;
        signal_handle.abort();

        let report = result?;
        let mut summary = format!(
            "Stored {} of {} files",
            report.stored.len(),
            report.stored.len() + report.failed.len()
        );
        if report.outcome == Some(MonitorOutcome::Idle) {
            summary.push_str(", nothing left to seed");
        }
        Ok(summary)
    }
}
