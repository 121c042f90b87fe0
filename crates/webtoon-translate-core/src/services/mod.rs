//! Request-facing service layer.
//!
//! Services sit between the HTTP handlers and the store/storage layers and
//! own the business rules: upload validation, quota accounting, job
//! creation, batch fan-out and the erase retouch flow. They return
//! [`ServiceError`]s which the API layer maps onto HTTP status codes and
//! stable error codes.

mod batch;
mod erase;
mod quota;
mod translation;
mod upload;

pub use batch::{BatchImageView, BatchService, BatchView};
pub use erase::EraseService;
pub use quota::{QuotaService, UsageReport};
pub use translation::TranslationService;
pub use upload::UploadService;

use chrono::{DateTime, Utc};

/// Errors surfaced to API clients. Every variant corresponds to a stable
/// error code in the HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The uploaded payload failed validation.
    #[error("{0}")]
    InvalidImage(String),

    /// The upload id is malformed or names no live upload.
    #[error("Invalid upload id: {0}")]
    InvalidUploadId(String),

    /// No live upload with this id.
    #[error("Upload not found: {0}")]
    UploadNotFound(String),

    /// The weekly image quota is exhausted.
    #[error("Weekly image quota exceeded ({used}/{limit})")]
    QuotaExceeded {
        used: u64,
        limit: u64,
        resets_at: DateTime<Utc>,
    },

    /// The translation id is malformed.
    #[error("Invalid translate id: {0}")]
    InvalidTranslateId(String),

    /// No live translation job with this id.
    #[error("Translation not found: {0}")]
    TranslateNotFound(String),

    /// The job has not reached `completed` yet.
    #[error("Translation is not completed (status: {0})")]
    TranslateNotCompleted(String),

    /// The job completed but its result blob is gone.
    #[error("Result image not found")]
    ResultImageNotFound,

    /// The erase mask could not be decoded.
    #[error("{0}")]
    InvalidMask(String),

    /// Background restoration failed.
    #[error("Inpainting failed: {0}")]
    InpaintingFailed(String),

    /// The batch id is malformed.
    #[error("Invalid batch id: {0}")]
    InvalidBatchId(String),

    /// No live batch with this id.
    #[error("Batch not found: {0}")]
    BatchNotFound(String),

    /// A batch request without upload ids.
    #[error("A batch needs at least one upload id")]
    EmptyBatch,

    /// More images than a single batch may carry.
    #[error("A batch may hold at most {max} images")]
    BatchTooLarge { max: usize },

    /// Store, storage or pipeline failure not caused by the client.
    #[error(transparent)]
    Internal(#[from] crate::Error),
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
