//! Translation job endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{TranslationRecord, TranslationStatus};

use super::error::ApiError;
use super::extract::ClientIp;
use super::state::AppState;

pub(super) fn default_source_language() -> String {
    "ko".to_string()
}

pub(super) fn default_target_language() -> String {
    "en".to_string()
}

/// Body of `POST /translate`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateRequest {
    pub upload_id: String,
    #[serde(default = "default_source_language")]
    pub source_language: String,
    #[serde(default = "default_target_language")]
    pub target_language: String,
}

/// A translation job as returned by create and get.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationBody {
    pub translate_id: String,
    pub status: TranslationStatus,
    pub upload_id: String,
    pub source_language: String,
    pub target_language: String,
    pub original_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl From<TranslationRecord> for TranslationBody {
    fn from(record: TranslationRecord) -> Self {
        Self {
            translate_id: record.translate_id,
            status: record.status,
            upload_id: record.upload_id,
            source_language: record.source_language,
            target_language: record.target_language,
            original_url: record.original_url,
            result_url: record.result_url,
            created_at: record.created_at,
            completed_at: record.completed_at,
            error_message: record.error_message,
        }
    }
}

/// `POST /translate`: create a translation job for an upload.
pub async fn create(
    State(state): State<AppState>,
    client: ClientIp,
    Json(request): Json<TranslateRequest>,
) -> Result<(StatusCode, Json<TranslationBody>), ApiError> {
    let record = state
        .translations
        .create(
            &request.upload_id,
            &request.source_language,
            &request.target_language,
            client.as_str(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(record.into())))
}

/// `GET /translate/{translate_id}`
pub async fn get(
    State(state): State<AppState>,
    Path(translate_id): Path<String>,
) -> Result<Json<TranslationBody>, ApiError> {
    let record = state.translations.get(&translate_id).await?;
    Ok(Json(record.into()))
}
