//! Google Gemini translation client.
//!
//! Crops every valid region from the page, sends the crops as inline image
//! parts of a single `generateContent` call and asks for a JSON array reply.
//! Individual reply items that fail validation are dropped with a warning;
//! the rest still translate the page.

use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use base64::prelude::*;
use image::{imageops, ImageFormat, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{RegionTranslation, Translator};
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::error::ProviderError;
use crate::geometry::BBox;
use crate::Result;

const PROVIDER: &str = "translation";

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

fn build_prompt(source_lang: &str, target_lang: &str) -> String {
    let source = language_name(source_lang);
    let target = language_name(target_lang);
    format!(
        "Each image is a text region cropped from a comic page.\n\
         Translate the {source} text in each image into {target}.\n\n\
         Rules:\n\
         - Number the images in order, starting at index 0\n\
         - Translate onomatopoeia into natural {target} sound effects\n\
         - Use an empty string when a region is empty or unreadable\n\n\
         Respond with a JSON array only:\n\
         [{{\"index\": 0, \"translated\": \"Hello\"}}, {{\"index\": 1, \"translated\": \"BOOM\"}}]"
    )
}

fn language_name(code: &str) -> &str {
    match code {
        "ko" => "Korean",
        "en" => "English",
        "ja" => "Japanese",
        "zh" => "Chinese",
        other => other,
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Serialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: &'static str,
    data: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'static str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate.
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|part| part.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct RawTranslation {
    index: usize,
    translated: String,
}

/// Translator backed by the Gemini multimodal API.
pub struct GeminiTranslator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    breaker: CircuitBreaker,
}

impl GeminiTranslator {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| crate::Error::Config(format!("translation http client: {e}")))?;
        Ok(Self {
            client,
            api_key,
            model,
            breaker: CircuitBreaker::new(CircuitBreakerConfig {
                name: PROVIDER.to_string(),
                failure_threshold: 3,
                cooldown: Duration::from_secs(60),
                probe_successes: 1,
            }),
        })
    }

    async fn request_translation(
        &self,
        prompt: &str,
        crops: Vec<Part<'_>>,
    ) -> std::result::Result<String, ProviderError> {
        let mut parts = Vec::with_capacity(crops.len() + 1);
        parts.push(Part::Text { text: prompt });
        parts.extend(crops);

        let request = GenerateRequest {
            contents: vec![Content { parts }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        };

        let url = format!("{}/models/{}:generateContent", GEMINI_BASE_URL, self.model);
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(PROVIDER, e))?;

        if !response.status().is_success() {
            return Err(ProviderError::Unavailable {
                provider: PROVIDER.to_string(),
                message: format!("gemini returned {}", response.status()),
            });
        }

        let reply: GenerateResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::BadResponse {
                    provider: PROVIDER.to_string(),
                    message: format!("unparseable reply: {e}"),
                })?;

        let text = reply.text();
        if text.is_empty() {
            return Err(ProviderError::BadResponse {
                provider: PROVIDER.to_string(),
                message: "empty reply".to_string(),
            });
        }
        Ok(text)
    }
}

#[async_trait]
impl Translator for GeminiTranslator {
    async fn translate(
        &self,
        page: &RgbImage,
        regions: &[BBox],
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Vec<RegionTranslation>> {
        if regions.is_empty() {
            return Ok(Vec::new());
        }

        let (crops, original_indices) = crop_parts(page, regions)?;
        if crops.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            "Translating {} regions {} -> {}",
            crops.len(),
            source_lang,
            target_lang
        );
        let prompt = build_prompt(source_lang, target_lang);
        let payload = self
            .breaker
            .call(self.request_translation(&prompt, crops))
            .await?;

        Ok(parse_translations(&payload, &original_indices)?)
    }
}

/// PNG-encode every region that survives clipping to the page. Returns the
/// inline parts and, per part, the index of the region it was cropped from.
fn crop_parts(page: &RgbImage, regions: &[BBox]) -> Result<(Vec<Part<'static>>, Vec<usize>)> {
    let (width, height) = page.dimensions();
    let mut parts = Vec::new();
    let mut original_indices = Vec::new();

    for (index, bbox) in regions.iter().enumerate() {
        let Some(rect) = bbox.to_pixel_rect(width, height) else {
            continue;
        };
        let crop = imageops::crop_imm(page, rect.x, rect.y, rect.width, rect.height).to_image();
        let mut png = Vec::new();
        crop.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        parts.push(Part::InlineData {
            inline_data: InlineData {
                mime_type: "image/png",
                data: BASE64_STANDARD.encode(&png),
            },
        });
        original_indices.push(index);
    }

    Ok((parts, original_indices))
}

/// Parse the model's JSON array reply, mapping part indexes back to region
/// indexes. Items that fail validation or point at parts that were never
/// sent are dropped with a warning.
fn parse_translations(
    payload: &str,
    original_indices: &[usize],
) -> std::result::Result<Vec<RegionTranslation>, ProviderError> {
    let value: serde_json::Value =
        serde_json::from_str(payload).map_err(|e| ProviderError::BadResponse {
            provider: PROVIDER.to_string(),
            message: format!("reply is not JSON: {e}"),
        })?;

    let items = value.as_array().ok_or_else(|| ProviderError::BadResponse {
        provider: PROVIDER.to_string(),
        message: "reply is not a JSON array".to_string(),
    })?;

    let mut translations = Vec::with_capacity(items.len());
    for item in items {
        let parsed: RawTranslation = match serde_json::from_value(item.clone()) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Dropping unusable translation item {}: {}", item, e);
                continue;
            }
        };
        let Some(&region_index) = original_indices.get(parsed.index) else {
            warn!(
                "Dropping translation for unknown part index {}",
                parsed.index
            );
            continue;
        };
        translations.push(RegionTranslation {
            index: region_index,
            text: parsed.translated,
        });
    }

    translations.sort_by_key(|t| t.index);
    Ok(translations)
}
