//! Erase retouch endpoint.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::state::AppState;

/// Body of `POST /erase`: a completed job and a brush mask.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EraseRequest {
    pub translate_id: String,
    /// Base64-encoded mask PNG; non-black pixels mark regions to clear.
    pub mask_image: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EraseBody {
    pub translate_id: String,
    /// Base64-encoded retouched result PNG.
    pub result_image: String,
}

/// `POST /erase`: remove masked regions from a completed result image.
///
/// The retouch is synchronous and the result is returned inline rather than
/// stored, so repeated erases always start from the original result.
pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<EraseRequest>,
) -> Result<Json<EraseBody>, ApiError> {
    let result_image = state
        .erase
        .erase(&request.translate_id, &request.mask_image)
        .await?;
    Ok(Json(EraseBody {
        translate_id: request.translate_id,
        result_image,
    }))
}
