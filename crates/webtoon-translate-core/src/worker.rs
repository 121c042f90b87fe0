//! Background worker engine.
//!
//! The worker turns `pending` translation records into results: it polls
//! the store for claimable jobs, runs each through the pipeline under a
//! timeout and writes the outcome back. A periodic sweep purges expired
//! records and their blobs. Claiming is atomic in the store, so several
//! worker processes can share one queue.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use chrono::Utc;
use tokio::sync::{broadcast, Semaphore};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::health::HealthCheck;
use crate::metrics::{JobOutcome, ServiceMetrics};
use crate::pipeline::TranslatePipeline;
use crate::storage::{create_backend, result_key, StorageBackend};
use crate::store::{create_store, MetadataStore, TranslationRecord, TranslationUpdate};
use crate::{Error, Result};

/// Health components the worker reports on.
const HEALTH_COMPONENTS: &[&str] = &["store", "storage", "detection", "inpainting", "translation"];

/// Claims and processes translation jobs.
pub struct WorkerEngine {
    config: Config,
    store: Arc<dyn MetadataStore>,
    storage: Arc<dyn StorageBackend>,
    pipeline: Arc<TranslatePipeline>,
    health: Arc<HealthCheck>,
    metrics: Arc<ServiceMetrics>,
    shutdown_tx: broadcast::Sender<()>,
}

impl WorkerEngine {
    /// Create a worker with its own store and storage connections.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let store = create_store(&config.store).await?;
        let storage = create_backend(&config.storage)?;
        let metrics = Arc::new(ServiceMetrics::new());
        Self::with_components(config, store, storage, metrics)
    }

    /// Create a worker around existing components, so a combined
    /// server+worker process shares one store, storage and metrics registry.
    pub fn with_components(
        config: Config,
        store: Arc<dyn MetadataStore>,
        storage: Arc<dyn StorageBackend>,
        metrics: Arc<ServiceMetrics>,
    ) -> Result<Self> {
        let pipeline = Arc::new(TranslatePipeline::from_config(&config, metrics.clone())?);

        let health = Arc::new(HealthCheck::new());
        for component in HEALTH_COMPONENTS {
            health.register_component(component);
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            config,
            store,
            storage,
            pipeline,
            health,
            metrics,
            shutdown_tx,
        })
    }

    /// The worker's health registry, so a combined process can surface it
    /// over the API as well.
    pub fn health(&self) -> Arc<HealthCheck> {
        self.health.clone()
    }

    /// Get a shutdown signal receiver.
    pub fn shutdown_receiver(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Run the claim/process loop until shutdown. In-flight jobs finish
    /// before this returns.
    pub async fn run(&self) -> Result<()> {
        let worker = &self.config.worker;
        let semaphore = Arc::new(Semaphore::new(worker.concurrency));
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let mut purge_tick =
            tokio::time::interval(Duration::from_secs(worker.purge_interval_secs.max(1)));
        purge_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of an interval fires immediately; a purge at
        // startup is fine, so no special casing.

        info!(
            "Worker starting with concurrency={}, poll_interval_ms={}, job_timeout_secs={}",
            worker.concurrency, worker.poll_interval_ms, worker.job_timeout_secs
        );

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, waiting for in-flight jobs");
                    break;
                }
                _ = purge_tick.tick() => {
                    self.purge_expired().await;
                }
                _ = tokio::time::sleep(Duration::from_millis(worker.poll_interval_ms)) => {
                    self.claim_ready_jobs(&semaphore).await;
                }
            }
        }

        // Every permit back home means every spawned job has finished.
        let _ = semaphore
            .acquire_many(self.config.worker.concurrency as u32)
            .await;
        info!("Worker stopped");
        Ok(())
    }

    /// Claim as many pending jobs as free capacity allows.
    async fn claim_ready_jobs(&self, semaphore: &Arc<Semaphore>) {
        loop {
            let Ok(permit) = semaphore.clone().try_acquire_owned() else {
                return; // all slots busy
            };

            let job = match self.store.claim_pending_translation().await {
                Ok(Some(job)) => {
                    self.health.mark_healthy("store");
                    job
                }
                Ok(None) => {
                    self.health.mark_healthy("store");
                    return;
                }
                Err(err) => {
                    warn!("Failed to poll for pending jobs: {}", err);
                    self.health.mark_degraded("store", &err.to_string());
                    return;
                }
            };

            let ctx = JobContext {
                job,
                config: self.config.clone(),
                store: self.store.clone(),
                storage: self.storage.clone(),
                pipeline: self.pipeline.clone(),
                health: self.health.clone(),
                metrics: self.metrics.clone(),
            };
            tokio::spawn(async move {
                ctx.process().await;
                drop(permit);
            });
        }
    }

    /// Delete expired records and the blobs they owned.
    async fn purge_expired(&self) {
        let summary = match self.store.purge_expired(Utc::now()).await {
            Ok(summary) => summary,
            Err(err) => {
                warn!("Purge sweep failed: {}", err);
                self.health.mark_degraded("store", &err.to_string());
                return;
            }
        };

        if summary.total_records() > 0 {
            info!(
                "Purged {} expired record(s): {} uploads, {} translations, {} batches, {} quota rows",
                summary.total_records(),
                summary.uploads,
                summary.translations,
                summary.batches,
                summary.quotas
            );
        }

        for key in &summary.storage_keys {
            if let Err(err) = self.storage.delete(key).await {
                warn!("Failed to delete expired blob {}: {}", key, err);
            }
        }
    }
}

/// Everything one job needs, moved into its task.
struct JobContext {
    job: TranslationRecord,
    config: Config,
    store: Arc<dyn MetadataStore>,
    storage: Arc<dyn StorageBackend>,
    pipeline: Arc<TranslatePipeline>,
    health: Arc<HealthCheck>,
    metrics: Arc<ServiceMetrics>,
}

impl JobContext {
    async fn process(self) {
        let translate_id = self.job.translate_id.clone();
        let started = Instant::now();
        self.health.job_started();
        info!(
            "[{}] Processing translation ({} -> {})",
            translate_id, self.job.source_language, self.job.target_language
        );

        let timeout = Duration::from_secs(self.config.worker.job_timeout_secs);
        let outcome = match tokio::time::timeout(timeout, self.translate()).await {
            Ok(Ok(result_url)) => {
                self.finish(TranslationUpdate::completed(&translate_id, result_url))
                    .await;
                self.health.record_image();
                info!(
                    "[{}] Completed in {:.1}s",
                    translate_id,
                    started.elapsed().as_secs_f64()
                );
                JobOutcome::Completed
            }
            Ok(Err(err)) => {
                error!("[{}] Failed: {}", translate_id, err);
                if let Error::Provider(provider_err) = &err {
                    self.health
                        .mark_degraded(provider_err.provider(), &provider_err.to_string());
                }
                self.finish(TranslationUpdate::failed(&translate_id, err.to_string()))
                    .await;
                JobOutcome::Failed
            }
            Err(_) => {
                error!(
                    "[{}] Timed out after {}s",
                    translate_id, self.config.worker.job_timeout_secs
                );
                self.finish(TranslationUpdate::failed(
                    &translate_id,
                    format!(
                        "Translation timed out after {}s",
                        self.config.worker.job_timeout_secs
                    ),
                ))
                .await;
                JobOutcome::TimedOut
            }
        };

        self.metrics.record_job(outcome, started.elapsed());
        self.health.job_finished();
    }

    /// Load the original, run the pipeline and store the result. Returns
    /// the public result URL.
    async fn translate(&self) -> Result<String> {
        let upload = self
            .store
            .get_upload(&self.job.upload_id)
            .await?
            .ok_or_else(|| {
                Error::Pipeline(format!("Upload {} no longer exists", self.job.upload_id))
            })?;
        let original = self.storage.get(&upload.storage_key).await?;

        let result_png = self
            .pipeline
            .translate_page(
                &original,
                &self.job.source_language,
                &self.job.target_language,
            )
            .await?;

        let key = result_key(&self.job.translate_id);
        self.storage.put(&key, Bytes::from(result_png)).await?;
        self.health.mark_healthy("storage");

        Ok(self.config.static_url(&key))
    }

    async fn finish(&self, update: TranslationUpdate) {
        if let Err(err) = self.store.update_translation(&update).await {
            error!(
                "[{}] Failed to record job outcome: {}",
                update.translate_id, err
            );
        }
    }
}
