//! Batch translation endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::{BatchImageView, BatchView};
use crate::store::{BatchStatus, TranslationStatus};

use super::error::ApiError;
use super::extract::ClientIp;
use super::state::AppState;
use super::translate::{default_source_language, default_target_language};

/// Body of `POST /batch`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub upload_ids: Vec<String>,
    #[serde(default = "default_source_language")]
    pub source_language: String,
    #[serde(default = "default_target_language")]
    pub target_language: String,
}

/// One image of a batch in API form.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchImageBody {
    pub order_index: usize,
    pub upload_id: String,
    pub translate_id: String,
    pub status: TranslationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl From<BatchImageView> for BatchImageBody {
    fn from(view: BatchImageView) -> Self {
        Self {
            order_index: view.order_index,
            upload_id: view.upload_id,
            translate_id: view.translate_id,
            status: view.status,
            original_url: view.original_url,
            result_url: view.result_url,
            error_message: view.error_message,
        }
    }
}

/// A batch with its derived status.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchBody {
    pub batch_id: String,
    pub status: BatchStatus,
    pub images: Vec<BatchImageBody>,
    pub source_language: String,
    pub target_language: String,
    pub created_at: DateTime<Utc>,
}

impl From<BatchView> for BatchBody {
    fn from(view: BatchView) -> Self {
        Self {
            batch_id: view.batch_id,
            status: view.status,
            images: view.images.into_iter().map(Into::into).collect(),
            source_language: view.source_language,
            target_language: view.target_language,
            created_at: view.created_at,
        }
    }
}

/// `POST /batch`: create one translation job per upload.
pub async fn create(
    State(state): State<AppState>,
    client: ClientIp,
    Json(request): Json<BatchRequest>,
) -> Result<(StatusCode, Json<BatchBody>), ApiError> {
    let view = state
        .batches
        .create(
            &request.upload_ids,
            &request.source_language,
            &request.target_language,
            client.as_str(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(view.into())))
}

/// `GET /batch/{batch_id}`
pub async fn get(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
) -> Result<Json<BatchBody>, ApiError> {
    let view = state.batches.get(&batch_id).await?;
    Ok(Json(view.into()))
}
