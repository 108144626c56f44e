use axum::extract::{Json, Path, State};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use common::prelude::{DirectoryKey, DirectoryService, MemoryDirectory};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetValuesResponse {
    pub values: Vec<String>,
}

pub async fn handler(
    State(directory): State<MemoryDirectory>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, GetValuesError> {
    let key = DirectoryKey::from_hex(&key).ok_or_else(|| GetValuesError::InvalidKey(key.clone()))?;

    let values = directory
        .get(&key)
        .await
        .map_err(|e| GetValuesError::Failed(e.to_string()))?;

    Ok((http::StatusCode::OK, Json(GetValuesResponse { values })).into_response())
}

#[derive(Debug, thiserror::Error)]
pub enum GetValuesError {
    #[error("Invalid directory key: {0}")]
    InvalidKey(String),
    #[error("Failed to read values: {0}")]
    Failed(String),
}

impl IntoResponse for GetValuesError {
    fn into_response(self) -> Response {
        match self {
            GetValuesError::InvalidKey(key) => (
                http::StatusCode::BAD_REQUEST,
                format!("Invalid directory key: {}", key),
            )
                .into_response(),
            GetValuesError::Failed(msg) => {
                tracing::error!("directory get failed: {}", msg);
                (
                    http::StatusCode::INTERNAL_SERVER_ERROR,
                    "unknown server error",
                )
                    .into_response()
            }
        }
    }
}
