use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use common::prelude::MemoryDirectory;

pub async fn handler(State(directory): State<MemoryDirectory>) -> Response {
    let msg = serde_json::json!({"status": "ok", "keys": directory.key_count()});
    (StatusCode::OK, Json(msg)).into_response()
}
