use axum::Router;
use common::prelude::MemoryDirectory;

pub mod directory;

pub fn router(state: MemoryDirectory) -> Router<MemoryDirectory> {
    Router::new()
        .nest("/directory", directory::router(state.clone()))
        .with_state(state)
}
