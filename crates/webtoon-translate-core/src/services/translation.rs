//! Translation job creation and lookup.
//!
//! Creating a job *is* enqueueing it: a `pending` record in the store is
//! the unit of work the worker claims. Quota is charged before the record
//! is written and refunded if the write fails, so a client is never billed
//! for a job that does not exist.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{info, warn};

use crate::config::Config;
use crate::ident::{is_valid_translate_id, is_valid_upload_id, new_translate_id};
use crate::store::{MetadataStore, TranslationRecord, TranslationStatus, UploadRecord};

use super::{QuotaService, ServiceError, ServiceResult};

/// Creates and reads translation jobs.
pub struct TranslationService {
    store: Arc<dyn MetadataStore>,
    quota: Arc<QuotaService>,
    config: Config,
}

impl TranslationService {
    pub fn new(store: Arc<dyn MetadataStore>, quota: Arc<QuotaService>, config: Config) -> Self {
        Self {
            store,
            quota,
            config,
        }
    }

    /// Resolve an upload id to its live record. Malformed ids and missing
    /// uploads both come back as an invalid-upload error: from the caller's
    /// point of view the id simply does not name anything translatable.
    pub(super) async fn resolve_upload(&self, upload_id: &str) -> ServiceResult<UploadRecord> {
        if !is_valid_upload_id(upload_id) {
            return Err(ServiceError::InvalidUploadId(upload_id.to_string()));
        }
        self.store
            .get_upload(upload_id)
            .await
            .map_err(ServiceError::Internal)?
            .ok_or_else(|| ServiceError::InvalidUploadId(upload_id.to_string()))
    }

    /// Write a `pending` job for an already-validated upload. No quota is
    /// charged here; callers handle that.
    pub(super) async fn enqueue(
        &self,
        upload: &UploadRecord,
        source_language: &str,
        target_language: &str,
    ) -> ServiceResult<TranslationRecord> {
        let created_at = Utc::now();
        let record = TranslationRecord {
            translate_id: new_translate_id(),
            upload_id: upload.upload_id.clone(),
            status: TranslationStatus::Pending,
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
            original_url: self.config.static_url(&upload.storage_key),
            result_url: None,
            error_message: None,
            created_at,
            completed_at: None,
            expires_at: created_at + Duration::seconds(self.config.ttl.translation_secs as i64),
        };
        self.store
            .put_translation(&record)
            .await
            .map_err(ServiceError::Internal)?;
        Ok(record)
    }

    /// Create a single translation job for a client.
    pub async fn create(
        &self,
        upload_id: &str,
        source_language: &str,
        target_language: &str,
        client_ip: &str,
    ) -> ServiceResult<TranslationRecord> {
        let upload = self.resolve_upload(upload_id).await?;
        self.quota.consume(client_ip, 1).await?;

        match self.enqueue(&upload, source_language, target_language).await {
            Ok(record) => {
                info!(
                    "Created translation {} for {} ({} -> {})",
                    record.translate_id, upload_id, source_language, target_language
                );
                Ok(record)
            }
            Err(err) => {
                if let Err(refund_err) = self.quota.refund(client_ip, 1).await {
                    warn!("Quota refund failed: {}", refund_err);
                }
                Err(err)
            }
        }
    }

    /// Fetch a live job record.
    pub async fn get(&self, translate_id: &str) -> ServiceResult<TranslationRecord> {
        if !is_valid_translate_id(translate_id) {
            return Err(ServiceError::InvalidTranslateId(translate_id.to_string()));
        }
        self.store
            .get_translation(translate_id)
            .await
            .map_err(ServiceError::Internal)?
            .ok_or_else(|| ServiceError::TranslateNotFound(translate_id.to_string()))
    }
}
