//! Text translation for cleaned page regions.
//!
//! The translator sees the original page (text still in place) and the text
//! boxes; it answers with one translation per readable region, addressed by
//! region position.

pub mod gemini;

pub use gemini::GeminiTranslator;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::RgbImage;

use crate::config::{TranslationConfig, TranslationProvider};
use crate::geometry::BBox;
use crate::Result;

/// One translated region, addressed by its position in the region list
/// handed to [`Translator::translate`].
#[derive(Debug, Clone, PartialEq)]
pub struct RegionTranslation {
    pub index: usize,
    pub text: String,
}

/// Region translator.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate the text found in `regions` of `page`.
    ///
    /// Regions the provider cannot read may be missing from the result;
    /// results are ordered by region index.
    async fn translate(
        &self,
        page: &RgbImage,
        regions: &[BBox],
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Vec<RegionTranslation>>;
}

/// Translator that translates nothing; pages come out cleaned but empty.
/// Useful for development without an API key.
pub struct DisabledTranslator;

#[async_trait]
impl Translator for DisabledTranslator {
    async fn translate(
        &self,
        _page: &RgbImage,
        _regions: &[BBox],
        _source_lang: &str,
        _target_lang: &str,
    ) -> Result<Vec<RegionTranslation>> {
        Ok(Vec::new())
    }
}

/// Build the configured translator.
pub fn create_translator(config: &TranslationConfig) -> Result<Arc<dyn Translator>> {
    match config.provider {
        TranslationProvider::Gemini => {
            let api_key = config
                .api_key
                .clone()
                .filter(|key| !key.is_empty())
                .ok_or_else(|| {
                    crate::Error::Config("translation.api_key is required".to_string())
                })?;
            Ok(Arc::new(GeminiTranslator::new(
                api_key,
                config.model.clone(),
                Duration::from_secs(config.timeout_secs),
            )?))
        }
        TranslationProvider::Disabled => Ok(Arc::new(DisabledTranslator)),
    }
}
