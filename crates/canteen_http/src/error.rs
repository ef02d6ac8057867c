use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use canteen_core::{StorageError, StoreError};
use log::{error, warn};
use serde::Serialize;

/// Request failure rendered as `{"error": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn into_message(self) -> String {
        match self {
            Self::BadRequest(message) | Self::NotFound(message) | Self::Internal(message) => {
                message
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Storage(StorageError::Validation(err)) => Self::BadRequest(err.to_string()),
            StoreError::Storage(StorageError::CustomerNotFound(id)) => {
                Self::NotFound(format!("customer `{id}` not found"))
            }
            other => {
                error!("event=http_request module=http status=error error={other}");
                Self::Internal(other.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_client_error() {
            warn!(
                "event=http_request module=http status=rejected code={}",
                status.as_u16()
            );
        }
        (
            status,
            Json(ErrorBody {
                error: self.into_message(),
            }),
        )
            .into_response()
    }
}
