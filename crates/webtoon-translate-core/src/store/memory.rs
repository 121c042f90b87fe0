//! In-memory metadata store for tests and single-process development runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;

use super::{
    BatchRecord, MetadataStore, PurgeSummary, QuotaDecision, TranslationRecord, TranslationStatus,
    TranslationUpdate, UploadRecord,
};
use crate::Result;

#[derive(Default)]
struct QuotaRow {
    used: u64,
    expires_at: DateTime<Utc>,
}

/// Volatile store with the same visibility rules as the SQLite backend:
/// expired records read as missing, updates never extend a TTL.
#[derive(Default)]
pub struct MemoryStore {
    uploads: Mutex<HashMap<String, UploadRecord>>,
    translations: Mutex<HashMap<String, TranslationRecord>>,
    batches: Mutex<HashMap<String, BatchRecord>>,
    quotas: Mutex<HashMap<String, QuotaRow>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for MemoryStore {
    async fn put_upload(&self, record: &UploadRecord) -> Result<()> {
        self.uploads
            .lock()
            .insert(record.upload_id.clone(), record.clone());
        Ok(())
    }

    async fn get_upload(&self, upload_id: &str) -> Result<Option<UploadRecord>> {
        let now = Utc::now();
        Ok(self
            .uploads
            .lock()
            .get(upload_id)
            .filter(|r| r.expires_at > now)
            .cloned())
    }

    async fn put_translation(&self, record: &TranslationRecord) -> Result<()> {
        self.translations
            .lock()
            .insert(record.translate_id.clone(), record.clone());
        Ok(())
    }

    async fn get_translation(&self, translate_id: &str) -> Result<Option<TranslationRecord>> {
        let now = Utc::now();
        Ok(self
            .translations
            .lock()
            .get(translate_id)
            .filter(|r| r.expires_at > now)
            .cloned())
    }

    async fn update_translation(&self, update: &TranslationUpdate) -> Result<()> {
        let mut translations = self.translations.lock();
        if let Some(record) = translations.get_mut(&update.translate_id) {
            record.status = update.status;
            if update.result_url.is_some() {
                record.result_url = update.result_url.clone();
            }
            if update.error_message.is_some() {
                record.error_message = update.error_message.clone();
            }
            if update.completed_at.is_some() {
                record.completed_at = update.completed_at;
            }
        }
        Ok(())
    }

    async fn claim_pending_translation(&self) -> Result<Option<TranslationRecord>> {
        let now = Utc::now();
        let mut translations = self.translations.lock();

        let next_id = translations
            .values()
            .filter(|r| r.status == TranslationStatus::Pending && r.expires_at > now)
            .min_by_key(|r| r.created_at)
            .map(|r| r.translate_id.clone());

        Ok(next_id.and_then(|id| {
            translations.get_mut(&id).map(|record| {
                record.status = TranslationStatus::Processing;
                record.clone()
            })
        }))
    }

    async fn put_batch(&self, record: &BatchRecord) -> Result<()> {
        self.batches
            .lock()
            .insert(record.batch_id.clone(), record.clone());
        Ok(())
    }

    async fn get_batch(&self, batch_id: &str) -> Result<Option<BatchRecord>> {
        let now = Utc::now();
        Ok(self
            .batches
            .lock()
            .get(batch_id)
            .filter(|r| r.expires_at > now)
            .cloned())
    }

    async fn consume_quota(
        &self,
        key: &str,
        amount: u64,
        limit: u64,
        expires_at: DateTime<Utc>,
    ) -> Result<QuotaDecision> {
        let mut quotas = self.quotas.lock();
        let row = quotas.entry(key.to_string()).or_insert_with(|| QuotaRow {
            used: 0,
            expires_at,
        });

        if row.used + amount <= limit {
            row.used += amount;
            Ok(QuotaDecision::Allowed { used: row.used })
        } else {
            Ok(QuotaDecision::Exceeded {
                used: row.used,
                limit,
            })
        }
    }

    async fn refund_quota(&self, key: &str, amount: u64) -> Result<()> {
        if let Some(row) = self.quotas.lock().get_mut(key) {
            row.used = row.used.saturating_sub(amount);
        }
        Ok(())
    }

    async fn quota_used(&self, key: &str) -> Result<u64> {
        let now = Utc::now();
        Ok(self
            .quotas
            .lock()
            .get(key)
            .filter(|r| r.expires_at > now)
            .map(|r| r.used)
            .unwrap_or(0))
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<PurgeSummary> {
        let mut summary = PurgeSummary::default();

        {
            let mut uploads = self.uploads.lock();
            let expired: Vec<String> = uploads
                .values()
                .filter(|r| r.expires_at <= now)
                .map(|r| r.upload_id.clone())
                .collect();
            for id in expired {
                if let Some(record) = uploads.remove(&id) {
                    summary.storage_keys.push(record.storage_key);
                    summary.uploads += 1;
                }
            }
        }

        {
            let mut translations = self.translations.lock();
            let expired: Vec<String> = translations
                .values()
                .filter(|r| r.expires_at <= now)
                .map(|r| r.translate_id.clone())
                .collect();
            for id in expired {
                translations.remove(&id);
                summary.storage_keys.push(crate::storage::result_key(&id));
                summary.translations += 1;
            }
        }

        {
            let mut batches = self.batches.lock();
            let before = batches.len();
            batches.retain(|_, r| r.expires_at > now);
            summary.batches = (before - batches.len()) as u64;
        }

        {
            let mut quotas = self.quotas.lock();
            let before = quotas.len();
            quotas.retain(|_, r| r.expires_at > now);
            summary.quotas = (before - quotas.len()) as u64;
        }

        Ok(summary)
    }
}
