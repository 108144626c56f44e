use common::prelude::{
    BlobSwarm, DirectoryAdapter, DirectoryService, SwarmEngine, TransferCoordinator,
};
use common::swarm::{BlobSwarmBuilder, BlobSwarmError};

use crate::database::{Catalog, CatalogError};
use crate::http_server::{HttpDirectory, HttpDirectoryError};
use crate::state::{AppState, StateError};

/// Everything one invocation works with: the catalog, the directory
///  adapter and the transfer coordinator with its swarm session.
#[derive(Debug)]
pub struct Session<D: DirectoryService, S: SwarmEngine> {
    pub catalog: Catalog,
    pub directory: DirectoryAdapter<D>,
    pub transfers: TransferCoordinator<S>,
}

/// A session talking to a directory node and the iroh swarm
pub type NodeSession = Session<HttpDirectory, BlobSwarm>;

impl<D: DirectoryService, S: SwarmEngine> Session<D, S> {
    pub fn new(catalog: Catalog, directory: DirectoryAdapter<D>, engine: S) -> Self {
        Self {
            catalog,
            directory,
            transfers: TransferCoordinator::new(engine),
        }
    }

    /// Stop the swarm session and close the catalog.
    pub async fn close(self) {
        if let Err(e) = self.transfers.shutdown().await {
            tracing::warn!("swarm engine did not shut down cleanly: {}", e);
        }
        self.catalog.close().await;
        tracing::debug!("session closed");
    }
}

impl NodeSession {
    /// Open the catalog, reach the directory node on `port` and bind the
    ///  swarm endpoint, all from the state directory.
    pub async fn connect(state: &AppState, port: u16) -> Result<Self, SessionError> {
        let catalog = Catalog::open(&state.db_path).await?;
        let directory = HttpDirectory::new(&state.directory_url(port)?)?;

        let mut builder = BlobSwarmBuilder::new()
            .secret_key(state.load_key()?)
            .blobs_path(state.blobs_path.clone());
        if let Some(peer_port) = state.config.peer_port {
            builder = builder.port(peer_port);
        }
        let engine = match builder.build().await {
            Ok(engine) => engine,
            Err(e) => {
                catalog.close().await;
                return Err(e.into());
            }
        };

        tracing::info!(node_id = %engine.node_id(), directory = %directory.base_url(), "session ready");
        Ok(Self::new(catalog, DirectoryAdapter::new(directory), engine))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("state error: {0}")]
    State(#[from] StateError),
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("directory client error: {0}")]
    Directory(#[from] HttpDirectoryError),
    #[error("swarm error: {0}")]
    Swarm(#[from] BlobSwarmError),
}
