//! HTTP client for the remote detection service.
//!
//! The service may be cold (model loading, container waking up), so failed
//! requests are retried with exponential backoff. Repeated failures trip a
//! circuit breaker so jobs stop burning their timeout budget on a dead
//! endpoint.

use async_trait::async_trait;
use base64::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::{Detection, TextDetector};
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::error::ProviderError;
use crate::Result;

const PROVIDER: &str = "detection";

#[derive(Serialize)]
struct DetectRequest<'a> {
    image: &'a str,
}

#[derive(Deserialize)]
struct DetectResponse {
    #[serde(default)]
    bubbles: Vec<Vec<f32>>,
    #[serde(default)]
    texts: Vec<Vec<f32>>,
}

/// Detector backed by a remote HTTP model service.
pub struct RemoteDetector {
    client: reqwest::Client,
    endpoint: String,
    max_retries: u32,
    breaker: CircuitBreaker,
}

impl RemoteDetector {
    pub fn new(endpoint: String, timeout: Duration, max_retries: u32) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| crate::Error::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            max_retries,
            breaker: CircuitBreaker::new(CircuitBreakerConfig {
                name: PROVIDER.to_string(),
                failure_threshold: 5,
                cooldown: Duration::from_secs(30),
                probe_successes: 2,
            }),
        })
    }

    async fn request_detection(
        &self,
        image_b64: &str,
    ) -> std::result::Result<Detection, ProviderError> {
        let url = format!("{}/detect", self.endpoint);
        let response = self
            .client
            .post(&url)
            .json(&DetectRequest { image: image_b64 })
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(PROVIDER, e))?;

        if !response.status().is_success() {
            return Err(ProviderError::Unavailable {
                provider: PROVIDER.to_string(),
                message: format!("detect endpoint returned {}", response.status()),
            });
        }

        let raw: DetectResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::BadResponse {
                    provider: PROVIDER.to_string(),
                    message: e.to_string(),
                })?;

        Ok(Detection::from_raw(&raw.bubbles, &raw.texts))
    }
}

#[async_trait]
impl TextDetector for RemoteDetector {
    async fn detect(&self, image_png: &[u8]) -> std::result::Result<Detection, ProviderError> {
        let image_b64 = BASE64_STANDARD.encode(image_png);
        let mut last_error: Option<ProviderError> = None;

        for attempt in 0..=self.max_retries {
            match self.breaker.call(self.request_detection(&image_b64)).await {
                Ok(detection) => {
                    debug!(
                        bubbles = detection.bubbles.len(),
                        texts = detection.texts.len(),
                        attempt,
                        "Detection succeeded"
                    );
                    return Ok(detection);
                }
                // An open circuit will not recover within this job; stop
                // retrying immediately.
                Err(e @ ProviderError::CircuitOpen { .. }) => return Err(e),
                Err(e) => {
                    warn!("Detection attempt {} failed: {}", attempt + 1, e);
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        tokio::time::sleep(Duration::from_secs(1u64 << attempt)).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ProviderError::Unavailable {
            provider: PROVIDER.to_string(),
            message: "no attempts made".to_string(),
        }))
    }
}
