//! Weekly per-client image quota.
//!
//! Single translations and batches draw from the same counter. Clients are
//! identified by a keyed hash of their IP; the counter key embeds the ISO
//! week so it rolls over every Monday 00:00 UTC on its own, with the row
//! expiry as a second line of cleanup.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::Config;
use crate::ident::{next_weekly_reset, weekly_quota_key};
use crate::metrics::ServiceMetrics;
use crate::store::{MetadataStore, QuotaDecision};

use super::{ServiceError, ServiceResult};

/// Current consumption for one client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageReport {
    pub used: u64,
    pub limit: u64,
    pub resets_at: DateTime<Utc>,
}

/// Weekly image quota bookkeeping.
pub struct QuotaService {
    store: Arc<dyn MetadataStore>,
    secret: String,
    limit: u64,
    metrics: Arc<ServiceMetrics>,
}

impl QuotaService {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        config: &Config,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self {
            store,
            secret: config.quota.ip_hash_secret.clone(),
            limit: config.limits.weekly_image_quota,
            metrics,
        }
    }

    /// Consume `amount` images from the client's weekly allowance, all or
    /// nothing.
    pub async fn consume(&self, client_ip: &str, amount: u64) -> ServiceResult<()> {
        let now = Utc::now();
        let key = weekly_quota_key(&self.secret, client_ip, now);
        let resets_at = next_weekly_reset(now);

        let decision = self
            .store
            .consume_quota(&key, amount, self.limit, resets_at)
            .await
            .map_err(ServiceError::Internal)?;

        match decision {
            QuotaDecision::Allowed { used } => {
                debug!("Quota consume {}: {}/{}", amount, used, self.limit);
                Ok(())
            }
            QuotaDecision::Exceeded { used, limit } => {
                self.metrics.record_quota_rejection();
                Err(ServiceError::QuotaExceeded {
                    used,
                    limit,
                    resets_at,
                })
            }
        }
    }

    /// Hand back `amount` images, flooring at zero. Used when job creation
    /// fails after the quota was already charged.
    pub async fn refund(&self, client_ip: &str, amount: u64) -> ServiceResult<()> {
        let key = weekly_quota_key(&self.secret, client_ip, Utc::now());
        self.store
            .refund_quota(&key, amount)
            .await
            .map_err(ServiceError::Internal)
    }

    /// Current usage for the client's active week.
    pub async fn usage(&self, client_ip: &str) -> ServiceResult<UsageReport> {
        let now = Utc::now();
        let key = weekly_quota_key(&self.secret, client_ip, now);
        let used = self
            .store
            .quota_used(&key)
            .await
            .map_err(ServiceError::Internal)?;
        Ok(UsageReport {
            used,
            limit: self.limit,
            resets_at: next_weekly_reset(now),
        })
    }
}
