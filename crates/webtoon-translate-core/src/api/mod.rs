//! HTTP API.
//!
//! One axum router serves the whole public surface: uploads, translation
//! jobs, batches, the erase retouch, quota usage, stored blobs, health and
//! metrics. Handlers stay thin; business rules live in [`crate::services`]
//! and errors arrive here as [`crate::services::ServiceError`] values that
//! map 1:1 onto stable HTTP error codes.

mod batch;
mod erase;
mod error;
mod extract;
mod state;
mod system;
mod translate;
mod upload;

pub use error::{ApiError, QuotaDetail};
pub use extract::ClientIp;
pub use state::AppState;

pub use batch::{BatchBody, BatchImageBody, BatchRequest};
pub use erase::{EraseBody, EraseRequest};
pub use system::UsageBody;
pub use translate::{TranslateRequest, TranslationBody};
pub use upload::UploadBody;

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::Result;

/// Slack above the upload limit for multipart boundaries and headers. The
/// upload service enforces the real per-file limit.
const MULTIPART_SLACK: usize = 64 * 1024;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);
    let body_limit = state.config.limits.upload.max_bytes as usize + MULTIPART_SLACK;

    Router::new()
        .route("/upload", post(upload::create))
        .route("/upload/{upload_id}", get(upload::get))
        .route("/translate", post(translate::create))
        .route("/translate/{translate_id}", get(translate::get))
        .route("/batch", post(batch::create))
        .route("/batch/{batch_id}", get(batch::get))
        .route("/erase", post(erase::create))
        .route("/usage", get(system::usage))
        .route("/health", get(system::health))
        .route("/metrics", get(system::metrics))
        .route("/static/{*key}", get(system::static_file))
        .layer(cors)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring unparseable CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(parsed)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(600))
}

/// Bind and serve the API until the shutdown signal fires.
pub async fn serve(state: AppState, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
    let bind_address = state.config.server.bind_address.clone();
    let listener = TcpListener::bind(&bind_address).await.map_err(|e| {
        crate::Error::Io(std::io::Error::new(
            std::io::ErrorKind::AddrInUse,
            format!("Failed to bind {}: {}", bind_address, e),
        ))
    })?;

    info!("API server listening on http://{}", bind_address);

    let app = router(state);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = shutdown.recv().await;
        info!("API server shutting down");
    })
    .await
    .map_err(crate::Error::Io)?;

    Ok(())
}
