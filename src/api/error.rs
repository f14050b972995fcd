use axum::{Json, http::StatusCode, response::IntoResponse};
use thiserror::Error;

use super::models::ErrorResponse;
use crate::imaging::ImagingError;
use crate::storage::StorageError;
use crate::streaming::StreamError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),
    #[error("source too large: {size} bytes (limit {limit})")]
    SourceTooLarge { size: u64, limit: u64 },
    #[error("decode failed: {0}")]
    DecodeFailed(String),
    #[error("encode failed: {0}")]
    EncodeFailed(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) | ApiError::UnsupportedFormat(_) => StatusCode::NOT_FOUND,
            ApiError::SourceTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::DecodeFailed(_)
            | ApiError::EncodeFailed(_)
            | ApiError::Storage(_)
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            ApiError::SourceTooLarge { .. } => "SOURCE_TOO_LARGE",
            ApiError::DecodeFailed(_) => "DECODE_FAILED",
            ApiError::EncodeFailed(_) => "ENCODE_FAILED",
            ApiError::Storage(_) => "STORAGE_ERROR",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = ErrorResponse {
            code: self.code(),
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::NotFound(key) => ApiError::NotFound(key),
            other => ApiError::Storage(other.to_string()),
        }
    }
}

impl From<ImagingError> for ApiError {
    fn from(value: ImagingError) -> Self {
        match value {
            ImagingError::Unsupported => ApiError::UnsupportedFormat(value.to_string()),
            ImagingError::Decode(reason) => ApiError::DecodeFailed(reason),
            other => ApiError::EncodeFailed(other.to_string()),
        }
    }
}

impl From<StreamError> for ApiError {
    fn from(value: StreamError) -> Self {
        ApiError::EncodeFailed(value.to_string())
    }
}
