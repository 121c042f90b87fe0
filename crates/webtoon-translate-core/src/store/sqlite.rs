//! SQLite-based metadata store implementation.
//!
//! Doubles as the job queue: `claim_pending_translation` flips the oldest
//! pending row to `processing` in a single guarded UPDATE, so any number of
//! workers can poll the same database without handing out a job twice.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

use super::{
    parse_status, BatchEntry, BatchRecord, MetadataStore, PurgeSummary, QuotaDecision,
    TranslationRecord, TranslationUpdate, UploadRecord,
};
use crate::error::StoreError;
use crate::Result;

/// Row shape shared by every query returning a translation.
type TranslationRow = (
    String,         // translate_id
    String,         // upload_id
    String,         // status
    String,         // source_language
    String,         // target_language
    String,         // original_url
    Option<String>, // result_url
    Option<String>, // error_message
    String,         // created_at
    Option<String>, // completed_at
    i64,            // expires_at
);

const TRANSLATION_COLUMNS: &str = "translate_id, upload_id, status, source_language, \
     target_language, original_url, result_url, error_message, created_at, completed_at, \
     expires_at";

/// SQLite-backed metadata store
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at the given path
    pub async fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await.ok();
        }

        let options =
            SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", db_path.display()))?
                .create_if_missing(true)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.initialize_schema().await?;

        Ok(store)
    }

    /// Initialize the database schema
    async fn initialize_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS uploads (
                upload_id TEXT PRIMARY KEY,
                filename TEXT NOT NULL,
                content_type TEXT NOT NULL,
                size_bytes INTEGER NOT NULL,
                storage_key TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS translations (
                translate_id TEXT PRIMARY KEY,
                upload_id TEXT NOT NULL,
                status TEXT NOT NULL,
                source_language TEXT NOT NULL,
                target_language TEXT NOT NULL,
                original_url TEXT NOT NULL,
                result_url TEXT,
                error_message TEXT,
                created_at TEXT NOT NULL,
                completed_at TEXT,
                expires_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS batches (
                batch_id TEXT PRIMARY KEY,
                source_language TEXT NOT NULL,
                target_language TEXT NOT NULL,
                entries TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS quota (
                quota_key TEXT PRIMARY KEY,
                used INTEGER NOT NULL DEFAULT 0,
                expires_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_translations_queue
                ON translations(status, created_at);
            CREATE INDEX IF NOT EXISTS idx_uploads_expiry ON uploads(expires_at);
            CREATE INDEX IF NOT EXISTS idx_translations_expiry ON translations(expires_at);
            "#,
        )
        .execute(&self.pool)
        .await?;

        debug!("SQLite schema initialized");
        Ok(())
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Serialization(format!("bad timestamp {:?}: {}", raw, e)).into())
}

fn from_epoch(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
}

fn translation_from_row(row: TranslationRow) -> Result<TranslationRecord> {
    let (
        translate_id,
        upload_id,
        status,
        source_language,
        target_language,
        original_url,
        result_url,
        error_message,
        created_at,
        completed_at,
        expires_at,
    ) = row;

    Ok(TranslationRecord {
        translate_id,
        upload_id,
        status: parse_status(&status)?,
        source_language,
        target_language,
        original_url,
        result_url,
        error_message,
        created_at: parse_timestamp(&created_at)?,
        completed_at: completed_at.as_deref().map(parse_timestamp).transpose()?,
        expires_at: from_epoch(expires_at),
    })
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn put_upload(&self, record: &UploadRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO uploads (upload_id, filename, content_type, size_bytes, storage_key,
                                 created_at, expires_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(upload_id) DO UPDATE SET
                filename = excluded.filename,
                content_type = excluded.content_type,
                size_bytes = excluded.size_bytes,
                storage_key = excluded.storage_key,
                created_at = excluded.created_at,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(&record.upload_id)
        .bind(&record.filename)
        .bind(&record.content_type)
        .bind(record.size_bytes as i64)
        .bind(&record.storage_key)
        .bind(record.created_at.to_rfc3339())
        .bind(record.expires_at.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_upload(&self, upload_id: &str) -> Result<Option<UploadRecord>> {
        let row: Option<(String, String, String, i64, String, String, i64)> = sqlx::query_as(
            "SELECT upload_id, filename, content_type, size_bytes, storage_key, created_at, \
             expires_at FROM uploads WHERE upload_id = ? AND expires_at > ?",
        )
        .bind(upload_id)
        .bind(Utc::now().timestamp())
        .fetch_optional(&self.pool)
        .await?;

        row.map(
            |(upload_id, filename, content_type, size_bytes, storage_key, created_at, expires_at)| {
                Ok(UploadRecord {
                    upload_id,
                    filename,
                    content_type,
                    size_bytes: size_bytes.max(0) as u64,
                    storage_key,
                    created_at: parse_timestamp(&created_at)?,
                    expires_at: from_epoch(expires_at),
                })
            },
        )
        .transpose()
    }

    async fn put_translation(&self, record: &TranslationRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO translations (translate_id, upload_id, status, source_language,
                                      target_language, original_url, result_url, error_message,
                                      created_at, completed_at, expires_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(translate_id) DO UPDATE SET
                status = excluded.status,
                result_url = excluded.result_url,
                error_message = excluded.error_message,
                completed_at = excluded.completed_at,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(&record.translate_id)
        .bind(&record.upload_id)
        .bind(record.status.as_str())
        .bind(&record.source_language)
        .bind(&record.target_language)
        .bind(&record.original_url)
        .bind(&record.result_url)
        .bind(&record.error_message)
        .bind(record.created_at.to_rfc3339())
        .bind(record.completed_at.map(|t| t.to_rfc3339()))
        .bind(record.expires_at.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_translation(&self, translate_id: &str) -> Result<Option<TranslationRecord>> {
        let row: Option<TranslationRow> = sqlx::query_as(&format!(
            "SELECT {} FROM translations WHERE translate_id = ? AND expires_at > ?",
            TRANSLATION_COLUMNS
        ))
        .bind(translate_id)
        .bind(Utc::now().timestamp())
        .fetch_optional(&self.pool)
        .await?;

        row.map(translation_from_row).transpose()
    }

    async fn update_translation(&self, update: &TranslationUpdate) -> Result<()> {
        // COALESCE keeps previously written fields when a transition does
        // not provide them; expires_at is never touched.
        sqlx::query(
            r#"
            UPDATE translations SET
                status = ?,
                result_url = COALESCE(?, result_url),
                error_message = COALESCE(?, error_message),
                completed_at = COALESCE(?, completed_at)
            WHERE translate_id = ?
            "#,
        )
        .bind(update.status.as_str())
        .bind(&update.result_url)
        .bind(&update.error_message)
        .bind(update.completed_at.map(|t| t.to_rfc3339()))
        .bind(&update.translate_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn claim_pending_translation(&self) -> Result<Option<TranslationRecord>> {
        let row: Option<TranslationRow> = sqlx::query_as(&format!(
            r#"
            UPDATE translations SET status = 'processing'
            WHERE translate_id = (
                SELECT translate_id FROM translations
                WHERE status = 'pending' AND expires_at > ?
                ORDER BY created_at ASC
                LIMIT 1
            )
            RETURNING {}
            "#,
            TRANSLATION_COLUMNS
        ))
        .bind(Utc::now().timestamp())
        .fetch_optional(&self.pool)
        .await?;

        row.map(translation_from_row).transpose()
    }

    async fn put_batch(&self, record: &BatchRecord) -> Result<()> {
        let entries = serde_json::to_string(&record.entries)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO batches (batch_id, source_language, target_language, entries,
                                 created_at, expires_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(batch_id) DO UPDATE SET
                entries = excluded.entries,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(&record.batch_id)
        .bind(&record.source_language)
        .bind(&record.target_language)
        .bind(entries)
        .bind(record.created_at.to_rfc3339())
        .bind(record.expires_at.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_batch(&self, batch_id: &str) -> Result<Option<BatchRecord>> {
        let row: Option<(String, String, String, String, String, i64)> = sqlx::query_as(
            "SELECT batch_id, source_language, target_language, entries, created_at, expires_at \
             FROM batches WHERE batch_id = ? AND expires_at > ?",
        )
        .bind(batch_id)
        .bind(Utc::now().timestamp())
        .fetch_optional(&self.pool)
        .await?;

        row.map(
            |(batch_id, source_language, target_language, entries, created_at, expires_at)| {
                let entries: Vec<BatchEntry> = serde_json::from_str(&entries)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(BatchRecord {
                    batch_id,
                    source_language,
                    target_language,
                    entries,
                    created_at: parse_timestamp(&created_at)?,
                    expires_at: from_epoch(expires_at),
                })
            },
        )
        .transpose()
    }

    async fn consume_quota(
        &self,
        key: &str,
        amount: u64,
        limit: u64,
        expires_at: DateTime<Utc>,
    ) -> Result<QuotaDecision> {
        sqlx::query(
            "INSERT INTO quota (quota_key, used, expires_at) VALUES (?, 0, ?) \
             ON CONFLICT(quota_key) DO NOTHING",
        )
        .bind(key)
        .bind(expires_at.timestamp())
        .execute(&self.pool)
        .await?;

        // The guard inside the UPDATE makes the check-and-increment atomic;
        // concurrent consumers serialize on the row.
        let updated = sqlx::query(
            "UPDATE quota SET used = used + ? WHERE quota_key = ? AND used + ? <= ?",
        )
        .bind(amount as i64)
        .bind(key)
        .bind(amount as i64)
        .bind(limit as i64)
        .execute(&self.pool)
        .await?;

        let (used,): (i64,) = sqlx::query_as("SELECT used FROM quota WHERE quota_key = ?")
            .bind(key)
            .fetch_one(&self.pool)
            .await?;
        let used = used.max(0) as u64;

        if updated.rows_affected() == 1 {
            Ok(QuotaDecision::Allowed { used })
        } else {
            Ok(QuotaDecision::Exceeded { used, limit })
        }
    }

    async fn refund_quota(&self, key: &str, amount: u64) -> Result<()> {
        sqlx::query("UPDATE quota SET used = max(0, used - ?) WHERE quota_key = ?")
            .bind(amount as i64)
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn quota_used(&self, key: &str) -> Result<u64> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT used FROM quota WHERE quota_key = ? AND expires_at > ?")
                .bind(key)
                .bind(Utc::now().timestamp())
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(used,)| used.max(0) as u64).unwrap_or(0))
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<PurgeSummary> {
        let cutoff = now.timestamp();
        let mut summary = PurgeSummary::default();

        let upload_keys: Vec<(String,)> =
            sqlx::query_as("SELECT storage_key FROM uploads WHERE expires_at <= ?")
                .bind(cutoff)
                .fetch_all(&self.pool)
                .await?;
        summary
            .storage_keys
            .extend(upload_keys.into_iter().map(|(key,)| key));
        summary.uploads = sqlx::query("DELETE FROM uploads WHERE expires_at <= ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?
            .rows_affected();

        let translate_ids: Vec<(String,)> =
            sqlx::query_as("SELECT translate_id FROM translations WHERE expires_at <= ?")
                .bind(cutoff)
                .fetch_all(&self.pool)
                .await?;
        summary.storage_keys.extend(
            translate_ids
                .into_iter()
                .map(|(id,)| crate::storage::result_key(&id)),
        );
        summary.translations = sqlx::query("DELETE FROM translations WHERE expires_at <= ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?
            .rows_affected();

        summary.batches = sqlx::query("DELETE FROM batches WHERE expires_at <= ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?
            .rows_affected();

        summary.quotas = sqlx::query("DELETE FROM quota WHERE expires_at <= ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if summary.total_records() > 0 {
            debug!(
                uploads = summary.uploads,
                translations = summary.translations,
                batches = summary.batches,
                quotas = summary.quotas,
                "Purged expired records"
            );
        }

        Ok(summary)
    }
}
