//! Prometheus metrics for the translation service.
//!
//! A single [`ServiceMetrics`] registry is shared between the HTTP API and
//! the worker engine and exposed in text format on `/metrics`.

pub mod labels;

pub use labels::{JobLabels, JobOutcome, ProviderLabels, ProviderOutcome, StageLabels};

use parking_lot::RwLock;
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::Histogram;
use prometheus_client::registry::Registry;
use std::time::Duration;

/// Job duration buckets (seconds). Jobs run from a few seconds up to the
/// 300s hard timeout.
const JOB_DURATION_BUCKETS: [f64; 9] = [1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 180.0, 300.0, 600.0];

/// Stage duration buckets (seconds). Local stages finish in milliseconds,
/// provider round-trips can take tens of seconds.
const STAGE_DURATION_BUCKETS: [f64; 10] =
    [0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 120.0];

/// Metrics registry for the translation service
pub struct ServiceMetrics {
    registry: RwLock<Registry>,

    /// Accepted uploads.
    pub uploads_total: Counter,

    /// Finished translation jobs by outcome.
    pub jobs_total: Family<JobLabels, Counter>,

    /// End-to-end job duration.
    pub job_duration_seconds: Histogram,

    /// Per-stage pipeline duration.
    pub stage_duration_seconds: Family<StageLabels, Histogram>,

    /// Requests rejected because the weekly image quota was exhausted.
    pub quota_rejections_total: Counter,

    /// Outbound provider requests by provider and outcome.
    pub provider_requests_total: Family<ProviderLabels, Counter>,

    /// Bubble erase requests served.
    pub erase_requests_total: Counter,
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceMetrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let uploads_total = Counter::default();
        let jobs_total = Family::<JobLabels, Counter>::default();
        let job_duration_seconds = Histogram::new(JOB_DURATION_BUCKETS.iter().cloned());
        let stage_duration_seconds = Family::<StageLabels, Histogram>::new_with_constructor(|| {
            Histogram::new(STAGE_DURATION_BUCKETS.iter().cloned())
        });
        let quota_rejections_total = Counter::default();
        let provider_requests_total = Family::<ProviderLabels, Counter>::default();
        let erase_requests_total = Counter::default();

        registry.register(
            "webtoon_uploads",
            "Accepted image uploads",
            uploads_total.clone(),
        );
        registry.register(
            "webtoon_jobs",
            "Finished translation jobs by outcome",
            jobs_total.clone(),
        );
        registry.register(
            "webtoon_job_duration_seconds",
            "End-to-end translation job duration",
            job_duration_seconds.clone(),
        );
        registry.register(
            "webtoon_stage_duration_seconds",
            "Pipeline stage duration",
            stage_duration_seconds.clone(),
        );
        registry.register(
            "webtoon_quota_rejections",
            "Requests rejected by the weekly image quota",
            quota_rejections_total.clone(),
        );
        registry.register(
            "webtoon_provider_requests",
            "Outbound provider requests by provider and outcome",
            provider_requests_total.clone(),
        );
        registry.register(
            "webtoon_erase_requests",
            "Bubble erase requests served",
            erase_requests_total.clone(),
        );

        Self {
            registry: RwLock::new(registry),
            uploads_total,
            jobs_total,
            job_duration_seconds,
            stage_duration_seconds,
            quota_rejections_total,
            provider_requests_total,
            erase_requests_total,
        }
    }

    pub fn record_upload(&self) {
        self.uploads_total.inc();
    }

    pub fn record_job(&self, outcome: JobOutcome, duration: Duration) {
        self.jobs_total.get_or_create(&JobLabels::new(outcome)).inc();
        self.job_duration_seconds.observe(duration.as_secs_f64());
    }

    pub fn record_stage(&self, stage: &str, duration: Duration) {
        self.stage_duration_seconds
            .get_or_create(&StageLabels::new(stage))
            .observe(duration.as_secs_f64());
    }

    pub fn record_quota_rejection(&self) {
        self.quota_rejections_total.inc();
    }

    pub fn record_provider_request(&self, provider: &str, outcome: ProviderOutcome) {
        self.provider_requests_total
            .get_or_create(&ProviderLabels::new(provider, outcome))
            .inc();
    }

    pub fn record_erase(&self) {
        self.erase_requests_total.inc();
    }

    /// Encode all metrics in Prometheus text exposition format
    pub fn encode(&self) -> String {
        let registry = self.registry.read();
        let mut buffer = String::new();
        if encode(&mut buffer, &registry).is_err() {
            return String::new();
        }
        buffer
    }
}
