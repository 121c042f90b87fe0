//! Client for a remote mask-driven inpainting service.
//!
//! Wire format: POST `{endpoint}/api/v1/inpaint` with base64 PNGs of the
//! page and a binary mask; the service answers with the restored image as
//! raw PNG bytes.

use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use base64::prelude::*;
use image::{GrayImage, ImageFormat, RgbImage};
use serde::Serialize;
use tracing::debug;

use super::{build_text_mask, BackgroundRestorer};
use crate::error::ProviderError;
use crate::geometry::BBox;
use crate::Result;

const PROVIDER: &str = "inpainting";

#[derive(Serialize)]
struct InpaintRequest<'a> {
    image: &'a str,
    mask: &'a str,
}

/// Remote model-based background restorer.
pub struct RemoteRestorer {
    client: reqwest::Client,
    endpoint: String,
}

impl RemoteRestorer {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| crate::Error::Config(format!("inpainting http client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    async fn request_inpaint(&self, image: &RgbImage, mask: &GrayImage) -> Result<RgbImage> {
        let mut image_png = Vec::new();
        image.write_to(&mut Cursor::new(&mut image_png), ImageFormat::Png)?;
        let mut mask_png = Vec::new();
        mask.write_to(&mut Cursor::new(&mut mask_png), ImageFormat::Png)?;

        let image_b64 = BASE64_STANDARD.encode(&image_png);
        let mask_b64 = BASE64_STANDARD.encode(&mask_png);
        let body = InpaintRequest {
            image: &image_b64,
            mask: &mask_b64,
        };

        debug!(
            "Requesting inpainting for a {}x{} page",
            image.width(),
            image.height()
        );
        let response = self
            .client
            .post(format!("{}/api/v1/inpaint", self.endpoint))
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(PROVIDER, e))?;

        if !response.status().is_success() {
            return Err(ProviderError::Unavailable {
                provider: PROVIDER.to_string(),
                message: format!("inpaint service returned {}", response.status()),
            }
            .into());
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderError::from_reqwest(PROVIDER, e))?;
        let restored = image::load_from_memory(&bytes).map_err(|e| ProviderError::BadResponse {
            provider: PROVIDER.to_string(),
            message: format!("reply is not a decodable image: {e}"),
        })?;
        Ok(restored.to_rgb8())
    }
}

#[async_trait]
impl BackgroundRestorer for RemoteRestorer {
    async fn restore(&self, image: RgbImage, texts: &[BBox]) -> Result<(RgbImage, Vec<BBox>)> {
        let (width, height) = image.dimensions();
        let mask = build_text_mask(width, height, texts);
        let restored = self.request_inpaint(&image, &mask).await?;
        // The model repaints the masked text boxes themselves, so each box
        // is also where the translation gets drawn.
        Ok((restored, texts.to_vec()))
    }

    async fn restore_mask(&self, image: &RgbImage, mask: &GrayImage) -> Result<RgbImage> {
        self.request_inpaint(image, mask).await
    }
}
