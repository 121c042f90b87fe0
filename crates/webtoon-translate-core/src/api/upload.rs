//! Upload endpoints.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::store::UploadRecord;

use super::error::ApiError;
use super::state::AppState;

/// Body of upload create and get responses.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadBody {
    pub upload_id: String,
    pub image_url: String,
    pub filename: String,
    pub content_type: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

impl UploadBody {
    fn from_record(record: &UploadRecord, config: &Config) -> Self {
        Self {
            upload_id: record.upload_id.clone(),
            image_url: config.static_url(&record.storage_key),
            filename: record.filename.clone(),
            content_type: record.content_type.clone(),
            size: record.size_bytes,
            created_at: record.created_at,
        }
    }
}

/// `POST /upload`: accept a multipart image and store it for translation.
pub async fn create(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadBody>), ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().map(str::to_string);
        let declared_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(multipart_error)?;

        let record = state
            .uploads
            .create_upload(filename.as_deref(), declared_type.as_deref(), data)
            .await?;
        let body = UploadBody::from_record(&record, &state.config);
        return Ok((StatusCode::CREATED, Json(body)));
    }

    Err(ApiError::new(
        StatusCode::BAD_REQUEST,
        "INVALID_IMAGE",
        "Multipart body has no file field",
    ))
}

/// `GET /upload/{upload_id}`
pub async fn get(
    State(state): State<AppState>,
    Path(upload_id): Path<String>,
) -> Result<Json<UploadBody>, ApiError> {
    let record = state.uploads.get_upload(&upload_id).await?;
    Ok(Json(UploadBody::from_record(&record, &state.config)))
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::new(
        StatusCode::BAD_REQUEST,
        "INVALID_IMAGE",
        format!("Upload could not be read: {}", err),
    )
}
