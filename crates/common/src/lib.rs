/**
 * Small newtypes shared by every layer:
 *  identities, locators and transfer handles.
 */
pub mod types;
/**
 * Publish/lookup over a directory service.
 *  The service itself is an external collaborator
 *  reached through the `DirectoryService` trait.
 */
pub mod directory;
/**
 * Swarm engines: content creation, seeding,
 *  joining and status snapshots.
 * Ships an iroh-blobs backed engine and an
 *  in-process engine for tests.
 */
pub mod swarm;
/**
 * Transfer coordination: tracks every handle
 *  created in an invocation and multiplexes their
 *  status into a single monitor loop.
 */
pub mod transfer;

pub mod prelude {
    pub use crate::directory::{
        DirectoryAdapter, DirectoryEntry, DirectoryError, DirectoryKey, DirectoryService,
        MemoryDirectory, RetryPolicy,
    };
    pub use crate::swarm::{BlobSwarm, MemorySwarm, SwarmEngine, TransferStatus};
    pub use crate::transfer::{
        HandleState, MonitorMode, MonitorOutcome, TransferCoordinator, TransferError,
        TransferKind,
    };
    pub use crate::types::{HandleId, Identity, Locator};
}
