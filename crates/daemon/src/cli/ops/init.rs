use std::path::PathBuf;

use clap::Args;

use hoard_daemon::state::{AppConfig, AppState, StateError};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// Host running the directory node
    #[arg(long)]
    pub directory_host: Option<String>,

    /// Port for the swarm endpoint (ephemeral if not set)
    #[arg(long)]
    pub peer_port: Option<u16>,

    /// Directory for log files (logs to stderr only if not set)
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("state error: {0}")]
    StateError(#[from] StateError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut config = AppConfig {
            peer_port: self.peer_port,
            log_dir: self.log_dir.clone(),
            ..Default::default()
        };
        if let Some(host) = &self.directory_host {
            config.directory_host = host.clone();
        }

        let state = AppState::init(ctx.config_path.clone(), Some(config))?;
        let node_id = state.load_key()?.public();

        Ok(format!(
            "Initialized hoard at {}\nNode id: {}",
            state.hoard_dir.display(),
            node_id
        ))
    }
}
