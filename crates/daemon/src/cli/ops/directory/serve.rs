use clap::Args;

use common::prelude::MemoryDirectory;
use hoard_daemon::http_server::{self, Config, HttpServerError};
use hoard_daemon::process::graceful_shutdown_blocker;

/// Run a directory node other hoard nodes publish to and look up from
///
/// Published values and provider records live in memory only. They are
///  lost when the node stops, and publishers must publish again.
#[derive(Args, Debug, Clone)]
pub struct Serve;

#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error(transparent)]
    Server(#[from] HttpServerError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Serve {
    type Error = ServeError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let (signal_handle, _shutdown_tx, shutdown_rx) = graceful_shutdown_blocker();

        let config = Config::for_port(ctx.port);
        let result = http_server::run(config, MemoryDirectory::new(), shutdown_rx).await;
        signal_handle.abort();

        result?;
        Ok("directory node stopped".to_string())
    }
}
