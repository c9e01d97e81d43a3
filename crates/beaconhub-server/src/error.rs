use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use beaconhub_core::CoreError;

/// HTTP-facing error type. The map endpoints speak XML to legacy consumers,
/// so error bodies are plain text rather than a structured payload.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Internal error: {0}")]
    Core(#[from] CoreError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Core(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "request failed");
        (self.status_code(), self.to_string()).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
