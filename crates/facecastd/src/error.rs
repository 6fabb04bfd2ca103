use crate::session::SessionError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use facecast_hw::CameraError;
use serde_json::json;
use thiserror::Error;

/// Errors surfaced to HTTP clients as `{"message": ...}`.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("No image part")]
    MissingImage,
    #[error("{0}")]
    BadRequest(String),
    #[error("No face found in image")]
    NoFace,
    #[error("Camera is busy with another stream")]
    DeviceBusy,
    #[error("Camera unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingImage | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NoFace => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::DeviceBusy => StatusCode::CONFLICT,
            ApiError::DeviceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "request rejected");
        }
        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::DeviceBusy | SessionError::DeviceUnavailable(CameraError::DeviceBusy) => {
                ApiError::DeviceBusy
            }
            SessionError::DeviceUnavailable(e) => ApiError::DeviceUnavailable(e.to_string()),
            SessionError::Spawn(e) => ApiError::Internal(format!("session thread: {e}")),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("worker task failed: {e}"))
    }
}
