use axum::routing::get;
use axum::Router;
use common::prelude::MemoryDirectory;

mod liveness;

pub fn router(state: MemoryDirectory) -> Router<MemoryDirectory> {
    Router::new()
        .route("/livez", get(liveness::handler))
        .with_state(state)
}
