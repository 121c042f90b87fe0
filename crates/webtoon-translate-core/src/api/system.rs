//! Health, metrics, usage and static file endpoints.

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::health::HealthStatus;
use crate::storage::validate_key;

use super::error::ApiError;
use super::extract::ClientIp;
use super::state::AppState;

/// `GET /health`: full component report. Unhealthy answers 503 so load
/// balancers stop routing to this instance.
pub async fn health(State(state): State<AppState>) -> Response {
    let report = state.health.report();
    let status = match report.status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };
    (status, Json(report)).into_response()
}

/// `GET /metrics`: Prometheus text exposition.
pub async fn metrics(State(state): State<AppState>) -> Response {
    let body = state.metrics.encode();
    (
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        body,
    )
        .into_response()
}

/// Body of `GET /usage`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageBody {
    pub used_count: u64,
    pub limit: u64,
    pub resets_at: DateTime<Utc>,
}

/// `GET /usage`: the caller's weekly quota consumption.
pub async fn usage(
    State(state): State<AppState>,
    client: ClientIp,
) -> Result<Json<UsageBody>, ApiError> {
    let report = state.quota.usage(client.as_str()).await?;
    Ok(Json(UsageBody {
        used_count: report.used,
        limit: report.limit,
        resets_at: report.resets_at,
    }))
}

/// `GET /static/{*key}`: serve a stored blob.
///
/// Traversal-shaped keys answer the same 404 as missing ones, so the
/// endpoint leaks nothing about the key space.
pub async fn static_file(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    if validate_key(&key).is_err() {
        return Err(ApiError::not_found(format!("No such file: {}", key)));
    }

    let exists = state
        .storage
        .exists(&key)
        .await
        .map_err(|_| ApiError::not_found(format!("No such file: {}", key)))?;
    if !exists {
        return Err(ApiError::not_found(format!("No such file: {}", key)));
    }

    let data = state
        .storage
        .get(&key)
        .await
        .map_err(|_| ApiError::not_found(format!("No such file: {}", key)))?;

    Ok(([(header::CONTENT_TYPE, content_type_for(&key))], data).into_response())
}

fn content_type_for(key: &str) -> &'static str {
    let lower = key.to_ascii_lowercase();
    if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else {
        "application/octet-stream"
    }
}
