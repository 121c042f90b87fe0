//! HTTP error envelope.
//!
//! Every error leaves the API as `{"code": "...", "message": "..."}` with a
//! stable machine-readable code. Quota rejections additionally carry the
//! current consumption so clients can render a meaningful message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::services::ServiceError;

/// An error response with a stable code.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub quota: Option<QuotaDetail>,
}

/// Extra fields attached to `RATE_LIMIT_EXCEEDED` responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaDetail {
    pub used_count: u64,
    pub limit: u64,
    pub resets_at: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    used_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resets_at: Option<DateTime<Utc>>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            quota: None,
        }
    }

    /// 400 response for requests whose peer address is unknown. Quota is
    /// keyed by client IP, so such requests cannot be served.
    pub fn unknown_client() -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "UNKNOWN_CLIENT",
            "Client address could not be determined",
        )
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("Request failed with {}: {}", self.code, self.message);
        }
        let body = ErrorBody {
            code: self.code,
            message: &self.message,
            used_count: self.quota.as_ref().map(|q| q.used_count),
            limit: self.quota.as_ref().map(|q| q.limit),
            resets_at: self.quota.as_ref().map(|q| q.resets_at),
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::InvalidImage(_) => {
                Self::new(StatusCode::BAD_REQUEST, "INVALID_IMAGE", message)
            }
            ServiceError::InvalidUploadId(_) => {
                Self::new(StatusCode::BAD_REQUEST, "INVALID_UPLOAD_ID", message)
            }
            ServiceError::UploadNotFound(_) => {
                Self::new(StatusCode::NOT_FOUND, "UPLOAD_NOT_FOUND", message)
            }
            ServiceError::QuotaExceeded {
                used,
                limit,
                resets_at,
            } => Self {
                status: StatusCode::TOO_MANY_REQUESTS,
                code: "RATE_LIMIT_EXCEEDED",
                message,
                quota: Some(QuotaDetail {
                    used_count: used,
                    limit,
                    resets_at,
                }),
            },
            ServiceError::InvalidTranslateId(_) => {
                Self::new(StatusCode::BAD_REQUEST, "INVALID_TRANSLATE_ID", message)
            }
            ServiceError::TranslateNotFound(_) => {
                Self::new(StatusCode::NOT_FOUND, "TRANSLATE_NOT_FOUND", message)
            }
            ServiceError::TranslateNotCompleted(_) => {
                Self::new(StatusCode::BAD_REQUEST, "TRANSLATE_NOT_COMPLETED", message)
            }
            ServiceError::ResultImageNotFound => {
                Self::new(StatusCode::NOT_FOUND, "RESULT_IMAGE_NOT_FOUND", message)
            }
            ServiceError::InvalidMask(_) => {
                Self::new(StatusCode::BAD_REQUEST, "INVALID_MASK", message)
            }
            ServiceError::InpaintingFailed(_) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INPAINTING_FAILED",
                message,
            ),
            ServiceError::InvalidBatchId(_) => {
                Self::new(StatusCode::BAD_REQUEST, "INVALID_BATCH_ID", message)
            }
            ServiceError::BatchNotFound(_) => {
                Self::new(StatusCode::NOT_FOUND, "BATCH_NOT_FOUND", message)
            }
            ServiceError::EmptyBatch => Self::new(StatusCode::BAD_REQUEST, "EMPTY_BATCH", message),
            ServiceError::BatchTooLarge { .. } => {
                Self::new(StatusCode::BAD_REQUEST, "BATCH_TOO_LARGE", message)
            }
            ServiceError::Internal(inner) => {
                error!("Internal error: {}", inner);
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error",
                )
            }
        }
    }
}
