// Catalog, pipelines and their supporting services
pub mod database;
pub mod http_server;
pub mod pipeline;
pub mod process;

// App state (configuration, paths)
pub mod state;

/// Default port of the directory node
pub const DEFAULT_DIRECTORY_PORT: u16 = 4222;

pub use database::{Catalog, CatalogError, MirroredEntry, OwnedEntry};
pub use state::{AppConfig, AppState, StateError};
