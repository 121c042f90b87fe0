//! Batch translation fan-out.
//!
//! A batch is a thin wrapper over per-image translation jobs: every upload
//! is validated up front, the quota is charged once for the whole batch,
//! then one job per image is created in submission order. Batch status is
//! never stored; reads recompute it from the children.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::config::Config;
use crate::ident::{is_valid_batch_id, new_batch_id};
use crate::store::{
    BatchEntry, BatchRecord, BatchStatus, MetadataStore, TranslationStatus, UploadRecord,
};

use super::{QuotaService, ServiceError, ServiceResult, TranslationService};

/// One image of a batch with its job's live state folded in.
#[derive(Debug, Clone)]
pub struct BatchImageView {
    pub order_index: usize,
    pub upload_id: String,
    pub translate_id: String,
    pub status: TranslationStatus,
    pub original_url: Option<String>,
    pub result_url: Option<String>,
    pub error_message: Option<String>,
}

/// A batch with derived status.
#[derive(Debug, Clone)]
pub struct BatchView {
    pub batch_id: String,
    pub status: BatchStatus,
    pub images: Vec<BatchImageView>,
    pub source_language: String,
    pub target_language: String,
    pub created_at: DateTime<Utc>,
}

/// Creates and reads batches of translation jobs.
pub struct BatchService {
    store: Arc<dyn MetadataStore>,
    translations: Arc<TranslationService>,
    quota: Arc<QuotaService>,
    max_batch_size: usize,
    ttl: Duration,
}

impl BatchService {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        translations: Arc<TranslationService>,
        quota: Arc<QuotaService>,
        config: &Config,
    ) -> Self {
        Self {
            store,
            translations,
            quota,
            max_batch_size: config.limits.max_batch_size,
            ttl: Duration::seconds(config.ttl.translation_secs as i64),
        }
    }

    /// Create one job per upload and a batch record tying them together.
    pub async fn create(
        &self,
        upload_ids: &[String],
        source_language: &str,
        target_language: &str,
        client_ip: &str,
    ) -> ServiceResult<BatchView> {
        if upload_ids.is_empty() {
            return Err(ServiceError::EmptyBatch);
        }
        if upload_ids.len() > self.max_batch_size {
            return Err(ServiceError::BatchTooLarge {
                max: self.max_batch_size,
            });
        }

        // Validate everything before charging anything.
        let mut uploads: Vec<UploadRecord> = Vec::with_capacity(upload_ids.len());
        for (index, upload_id) in upload_ids.iter().enumerate() {
            match self.translations.resolve_upload(upload_id).await {
                Ok(upload) => uploads.push(upload),
                Err(ServiceError::InvalidUploadId(_)) => {
                    return Err(ServiceError::InvalidUploadId(format!(
                        "{} (index {})",
                        upload_id, index
                    )));
                }
                Err(other) => return Err(other),
            }
        }

        let image_count = uploads.len() as u64;
        self.quota.consume(client_ip, image_count).await?;

        match self
            .fan_out(&uploads, source_language, target_language)
            .await
        {
            Ok(view) => {
                info!(
                    "Created batch {} with {} job(s)",
                    view.batch_id,
                    view.images.len()
                );
                Ok(view)
            }
            Err(err) => {
                if let Err(refund_err) = self.quota.refund(client_ip, image_count).await {
                    warn!("Batch quota refund failed: {}", refund_err);
                }
                Err(err)
            }
        }
    }

    async fn fan_out(
        &self,
        uploads: &[UploadRecord],
        source_language: &str,
        target_language: &str,
    ) -> ServiceResult<BatchView> {
        let created_at = Utc::now();
        let mut entries: Vec<BatchEntry> = Vec::with_capacity(uploads.len());
        let mut images: Vec<BatchImageView> = Vec::with_capacity(uploads.len());

        for (order_index, upload) in uploads.iter().enumerate() {
            let job = self
                .translations
                .enqueue(upload, source_language, target_language)
                .await?;
            entries.push(BatchEntry {
                order_index,
                upload_id: upload.upload_id.clone(),
                translate_id: job.translate_id.clone(),
            });
            images.push(BatchImageView {
                order_index,
                upload_id: upload.upload_id.clone(),
                translate_id: job.translate_id,
                status: TranslationStatus::Pending,
                original_url: Some(job.original_url),
                result_url: None,
                error_message: None,
            });
        }

        let record = BatchRecord {
            batch_id: new_batch_id(),
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
            entries,
            created_at,
            expires_at: created_at + self.ttl,
        };
        self.store
            .put_batch(&record)
            .await
            .map_err(ServiceError::Internal)?;

        Ok(BatchView {
            batch_id: record.batch_id,
            status: BatchStatus::Processing,
            images,
            source_language: record.source_language,
            target_language: record.target_language,
            created_at,
        })
    }

    /// Fetch a batch with every child's current state and the derived
    /// status. Children that expired out from under the batch show up as
    /// failed entries instead of poisoning the whole read.
    pub async fn get(&self, batch_id: &str) -> ServiceResult<BatchView> {
        if !is_valid_batch_id(batch_id) {
            return Err(ServiceError::InvalidBatchId(batch_id.to_string()));
        }
        let record = self
            .store
            .get_batch(batch_id)
            .await
            .map_err(ServiceError::Internal)?
            .ok_or_else(|| ServiceError::BatchNotFound(batch_id.to_string()))?;

        let mut images: Vec<BatchImageView> = Vec::with_capacity(record.entries.len());
        for entry in &record.entries {
            let job = self
                .store
                .get_translation(&entry.translate_id)
                .await
                .map_err(ServiceError::Internal)?;
            images.push(match job {
                Some(job) => BatchImageView {
                    order_index: entry.order_index,
                    upload_id: entry.upload_id.clone(),
                    translate_id: entry.translate_id.clone(),
                    status: job.status,
                    original_url: Some(job.original_url),
                    result_url: job.result_url,
                    error_message: job.error_message,
                },
                None => BatchImageView {
                    order_index: entry.order_index,
                    upload_id: entry.upload_id.clone(),
                    translate_id: entry.translate_id.clone(),
                    status: TranslationStatus::Failed,
                    original_url: None,
                    result_url: None,
                    error_message: Some("Translation metadata no longer exists".to_string()),
                },
            });
        }

        let status = BatchStatus::derive(
            &images.iter().map(|img| img.status).collect::<Vec<_>>(),
        );
        Ok(BatchView {
            batch_id: record.batch_id,
            status,
            images,
            source_language: record.source_language,
            target_language: record.target_language,
            created_at: record.created_at,
        })
    }
}
