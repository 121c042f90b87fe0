//! Label types for Prometheus metrics dimensions.

use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};

/// Terminal outcome of a translation job.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum JobOutcome {
    Completed,
    Failed,
    TimedOut,
}

/// Outcome of a single outbound provider request.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum ProviderOutcome {
    Ok,
    Error,
    Timeout,
    CircuitOpen,
}

/// Labels for job counters.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct JobLabels {
    pub outcome: JobOutcome,
}

impl JobLabels {
    pub fn new(outcome: JobOutcome) -> Self {
        Self { outcome }
    }
}

/// Labels for per-stage pipeline timings.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct StageLabels {
    pub stage: String,
}

impl StageLabels {
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
        }
    }
}

/// Labels for outbound provider requests.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ProviderLabels {
    pub provider: String,
    pub outcome: ProviderOutcome,
}

impl ProviderLabels {
    pub fn new(provider: impl Into<String>, outcome: ProviderOutcome) -> Self {
        Self {
            provider: provider.into(),
            outcome,
        }
    }
}
