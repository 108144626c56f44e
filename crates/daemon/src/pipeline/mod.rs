//! The six orchestration pipelines.
//!
//! Each pipeline takes only the components it drives. The long-running
//!  ones (`store`, `download`) take a [`Session`], which owns every
//!  component for one invocation and must be closed on the way out.

mod cleanup;
mod download;
mod lookup;
mod mirror;
mod new;
mod session;
mod store;

pub use cleanup::{cleanup, CleanupReport, CleanupScope};
pub use download::{download, DownloadReport};
pub use lookup::{format_entries, lookup};
pub use mirror::{mirror, MirrorError};
pub use new::{new_entries, NewError, NewReport};
pub use session::{NodeSession, Session, SessionError};
pub use store::{store, StoreReport};

use common::prelude::{DirectoryError, DirectoryService, SwarmEngine, TransferError};

use crate::database::CatalogError;

/// Failure of a long-running pipeline as a whole.
///  Per-entry failures are reported, not raised.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError<D: DirectoryService, S: SwarmEngine> {
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("{0}")]
    Directory(DirectoryError<D::Error>),
    #[error("{0}")]
    Transfer(TransferError<S::Error>),
    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),
}
