use std::fmt::Debug;
use std::path::Path;

use async_trait::async_trait;

mod blobs;
mod memory;
mod meter;

pub use blobs::{
    BlobLocator, BlobSwarm, BlobSwarmBuilder, BlobSwarmError, LOCATOR_SCHEME, RETRY_BASE_DELAY,
    RETRY_MAX_DELAY,
};
pub use memory::{MemorySwarm, MemorySwarmError};
pub use meter::RateMeter;

use crate::types::{HandleId, Locator};

/// Point-in-time snapshot of one transfer
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TransferStatus {
    /// Fraction of the content present locally, 0.0 ..= 1.0
    pub progress: f32,
    /// Peers currently connected for this transfer
    pub peers: u32,
    /// Bytes per second
    pub download_rate: u64,
    /// Bytes per second
    pub upload_rate: u64,
    pub total_downloaded: u64,
    pub total_uploaded: u64,
    /// Content is complete and offered to other peers
    pub is_seeding: bool,
    /// False once the engine has given up on the transfer
    pub is_valid: bool,
}

/// Peer-to-peer content distribution engine.
///
/// The engine runs its own networking in the background; callers only
///  register transfers and read synchronous status snapshots.
#[async_trait]
pub trait SwarmEngine: Send + Sync + Debug + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Hash the content at `path` and return a locator any peer can join
    async fn create_content(&self, path: &Path) -> Result<Locator, Self::Error>;

    /// Offer content previously created from `path` to the swarm
    async fn seed(&self, locator: &Locator, path: &Path) -> Result<HandleId, Self::Error>;

    /// Fetch the content behind `locator` into `save_path`.
    ///  Seeds immediately when the content is already present.
    async fn join(&self, locator: &Locator, save_path: &Path) -> Result<HandleId, Self::Error>;

    /// Current status of a handle, `None` if the engine does not know it
    fn status(&self, handle: HandleId) -> Option<TransferStatus>;

    /// How other peers name this node in provider records, if they can
    ///  fetch from it at all
    fn provider_id(&self) -> Option<String> {
        None
    }

    /// Peers besides the locator's own provider that hold its content.
    ///  Joins started afterwards, and retries of earlier ones, use them.
    fn add_providers(&self, _locator: &Locator, _providers: &[String]) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Stop networking. Registered transfers are not forgotten by the
    ///  engine's on-disk state.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}
