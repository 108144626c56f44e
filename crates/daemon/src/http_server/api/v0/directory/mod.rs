use axum::routing::get;
use axum::Router;
use common::prelude::MemoryDirectory;

pub mod get_values;
pub mod put_value;

pub use get_values::GetValuesResponse;
pub use put_value::PutValueRequest;

pub fn router(state: MemoryDirectory) -> Router<MemoryDirectory> {
    Router::new()
        .route(
            "/:key",
            get(get_values::handler).put(put_value::handler),
        )
        .with_state(state)
}
