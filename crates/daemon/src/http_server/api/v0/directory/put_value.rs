use axum::extract::{Json, Path, State};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use common::prelude::{DirectoryKey, DirectoryService, MemoryDirectory};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutValueRequest {
    pub value: String,
}

pub async fn handler(
    State(directory): State<MemoryDirectory>,
    Path(key): Path<String>,
    Json(req): Json<PutValueRequest>,
) -> Result<impl IntoResponse, PutValueError> {
    let key = DirectoryKey::from_hex(&key).ok_or_else(|| PutValueError::InvalidKey(key.clone()))?;

    directory
        .put(&key, req.value)
        .await
        .map_err(|e| PutValueError::Failed(e.to_string()))?;

    tracing::debug!(%key, "directory value stored");
    Ok(http::StatusCode::NO_CONTENT)
}

#[derive(Debug, thiserror::Error)]
pub enum PutValueError {
    #[error("Invalid directory key: {0}")]
    InvalidKey(String),
    #[error("Failed to store value: {0}")]
    Failed(String),
}

impl IntoResponse for PutValueError {
    fn into_response(self) -> Response {
        match self {
            PutValueError::InvalidKey(key) => (
                http::StatusCode::BAD_REQUEST,
                format!("Invalid directory key: {}", key),
            )
                .into_response(),
            PutValueError::Failed(msg) => {
                tracing::error!("directory put failed: {}", msg);
                (
                    http::StatusCode::INTERNAL_SERVER_ERROR,
                    "unknown server error",
                )
                    .into_response()
            }
        }
    }
}
