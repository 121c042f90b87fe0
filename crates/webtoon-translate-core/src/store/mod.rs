//! Metadata store abstraction and implementations.
//!
//! Uploads, translation jobs, batches and quota counters live behind a
//! domain-typed trait with two implementations:
//!
//! - **Sqlite**: durable store, also the job queue (production default)
//! - **Memory**: in-process store (tests and dev)
//!
//! Every record carries an expiry; reads filter expired rows and a periodic
//! purge removes them, so TTL semantics hold regardless of sweep cadence.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::Result;

/// Lifecycle of a translation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslationStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TranslationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranslationStatus::Pending => "pending",
            TranslationStatus::Processing => "processing",
            TranslationStatus::Completed => "completed",
            TranslationStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TranslationStatus::Pending),
            "processing" => Some(TranslationStatus::Processing),
            "completed" => Some(TranslationStatus::Completed),
            "failed" => Some(TranslationStatus::Failed),
            _ => None,
        }
    }

    /// Completed and failed jobs never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TranslationStatus::Completed | TranslationStatus::Failed)
    }
}

/// Derived status of a batch, computed from its children on every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Processing,
    Completed,
    PartialFailure,
    Failed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Processing => "processing",
            BatchStatus::Completed => "completed",
            BatchStatus::PartialFailure => "partial_failure",
            BatchStatus::Failed => "failed",
        }
    }

    /// Aggregate child statuses: still running wins, then all-completed,
    /// then all-failed, anything mixed is a partial failure.
    pub fn derive(children: &[TranslationStatus]) -> Self {
        if children
            .iter()
            .any(|s| matches!(s, TranslationStatus::Pending | TranslationStatus::Processing))
        {
            BatchStatus::Processing
        } else if children.iter().all(|s| *s == TranslationStatus::Completed) {
            BatchStatus::Completed
        } else if children.iter().all(|s| *s == TranslationStatus::Failed) {
            BatchStatus::Failed
        } else {
            BatchStatus::PartialFailure
        }
    }
}

/// A stored upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadRecord {
    /// Upload identifier (`upload_` + 8 hex)
    pub upload_id: String,

    /// Client-supplied filename, if any
    pub filename: String,

    /// Detected content type (`image/jpeg` or `image/png`)
    pub content_type: String,

    /// Payload size in bytes
    pub size_bytes: u64,

    /// Blob key of the original image
    pub storage_key: String,

    /// Creation time
    pub created_at: DateTime<Utc>,

    /// Expiry time; the record and its blob vanish after this
    pub expires_at: DateTime<Utc>,
}

/// A translation job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationRecord {
    /// Job identifier (`tr_` + 8 hex)
    pub translate_id: String,

    /// Source upload
    pub upload_id: String,

    /// Job status
    pub status: TranslationStatus,

    /// Language the page is in
    pub source_language: String,

    /// Language to translate into
    pub target_language: String,

    /// Public URL of the original image
    pub original_url: String,

    /// Public URL of the rendered result (completed jobs only)
    #[serde(default)]
    pub result_url: Option<String>,

    /// Failure detail (failed jobs only)
    #[serde(default)]
    pub error_message: Option<String>,

    /// Creation time
    pub created_at: DateTime<Utc>,

    /// Completion time (terminal jobs only)
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,

    /// Expiry time
    pub expires_at: DateTime<Utc>,
}

/// Status transition for a translation job.
///
/// `expires_at` is deliberately absent: updates never extend or shorten a
/// job's lifetime.
#[derive(Debug, Clone)]
pub struct TranslationUpdate {
    pub translate_id: String,
    pub status: TranslationStatus,
    pub result_url: Option<String>,
    pub error_message: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TranslationUpdate {
    /// Mark a job as currently running.
    pub fn processing(translate_id: &str) -> Self {
        Self {
            translate_id: translate_id.to_string(),
            status: TranslationStatus::Processing,
            result_url: None,
            error_message: None,
            completed_at: None,
        }
    }

    /// Mark a job as finished with a result.
    pub fn completed(translate_id: &str, result_url: String) -> Self {
        Self {
            translate_id: translate_id.to_string(),
            status: TranslationStatus::Completed,
            result_url: Some(result_url),
            error_message: None,
            completed_at: Some(Utc::now()),
        }
    }

    /// Mark a job as failed with a message.
    pub fn failed(translate_id: &str, message: impl Into<String>) -> Self {
        Self {
            translate_id: translate_id.to_string(),
            status: TranslationStatus::Failed,
            result_url: None,
            error_message: Some(message.into()),
            completed_at: Some(Utc::now()),
        }
    }
}

/// One image inside a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchEntry {
    /// Position in the submitted batch (0-based)
    pub order_index: usize,

    /// Source upload
    pub upload_id: String,

    /// Translation job created for this image
    pub translate_id: String,
}

/// A stored batch of translation jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRecord {
    /// Batch identifier (`batch_` + 8 hex)
    pub batch_id: String,

    /// Language the pages are in
    pub source_language: String,

    /// Language to translate into
    pub target_language: String,

    /// Per-image entries in submission order
    pub entries: Vec<BatchEntry>,

    /// Creation time
    pub created_at: DateTime<Utc>,

    /// Expiry time
    pub expires_at: DateTime<Utc>,
}

/// Outcome of an atomic quota consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    /// Consumption applied; `used` is the counter after the increment
    Allowed { used: u64 },
    /// Over the limit; nothing was consumed
    Exceeded { used: u64, limit: u64 },
}

/// What a purge sweep removed.
#[derive(Debug, Clone, Default)]
pub struct PurgeSummary {
    pub uploads: u64,
    pub translations: u64,
    pub batches: u64,
    pub quotas: u64,

    /// Blob keys whose owning records were purged; callers delete these
    /// from storage.
    pub storage_keys: Vec<String>,
}

impl PurgeSummary {
    pub fn total_records(&self) -> u64 {
        self.uploads + self.translations + self.batches + self.quotas
    }
}

/// Trait for metadata stores.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Persist an upload record
    async fn put_upload(&self, record: &UploadRecord) -> Result<()>;

    /// Fetch an upload; `None` when missing or expired
    async fn get_upload(&self, upload_id: &str) -> Result<Option<UploadRecord>>;

    /// Persist a translation job; `pending` jobs are the work queue
    async fn put_translation(&self, record: &TranslationRecord) -> Result<()>;

    /// Fetch a job; `None` when missing or expired
    async fn get_translation(&self, translate_id: &str) -> Result<Option<TranslationRecord>>;

    /// Apply a status transition, leaving the expiry untouched
    async fn update_translation(&self, update: &TranslationUpdate) -> Result<()>;

    /// Atomically claim the oldest non-expired `pending` job, flipping it to
    /// `processing`; `None` when the queue is empty
    async fn claim_pending_translation(&self) -> Result<Option<TranslationRecord>>;

    /// Persist a batch record
    async fn put_batch(&self, record: &BatchRecord) -> Result<()>;

    /// Fetch a batch; `None` when missing or expired
    async fn get_batch(&self, batch_id: &str) -> Result<Option<BatchRecord>>;

    /// Atomically consume quota: fails without side effects when
    /// `used + amount` would exceed `limit`. First use of a key creates the
    /// counter with the given expiry.
    async fn consume_quota(
        &self,
        key: &str,
        amount: u64,
        limit: u64,
        expires_at: DateTime<Utc>,
    ) -> Result<QuotaDecision>;

    /// Return quota, flooring at zero; missing keys are a no-op
    async fn refund_quota(&self, key: &str, amount: u64) -> Result<()>;

    /// Current counter for a key (0 when missing or expired)
    async fn quota_used(&self, key: &str) -> Result<u64>;

    /// Delete expired rows across all tables
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<PurgeSummary>;
}

/// Create a metadata store from configuration.
pub async fn create_store(config: &StoreConfig) -> Result<Arc<dyn MetadataStore>> {
    match config {
        StoreConfig::Sqlite { path } => Ok(Arc::new(SqliteStore::new(path).await?)),
        StoreConfig::Memory => Ok(Arc::new(MemoryStore::new())),
    }
}

pub(crate) fn parse_status(raw: &str) -> Result<TranslationStatus> {
    TranslationStatus::parse(raw).ok_or_else(|| {
        StoreError::Serialization(format!("unknown translation status: {}", raw)).into()
    })
}
