//! Webtoon Translation Core Library
//!
//! This crate provides the core functionality for the webtoon translation
//! service: image uploads, quota-limited translation jobs, the
//! detection/inpainting/translation/rendering pipeline, and the HTTP API.

pub mod api;
pub mod circuit_breaker;
pub mod config;
pub mod detection;
pub mod error;
pub mod geometry;
pub mod health;
pub mod ident;
pub mod inpaint;
pub mod metrics;
pub mod pipeline;
pub mod render;
pub mod segment;
pub mod services;
pub mod storage;
pub mod store;
pub mod translate;
pub mod worker;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use config::{Config, StorageConfig, StoreConfig};
pub use error::{Error, ProviderError, Result, StorageError, StoreError};
pub use geometry::{BBox, RegionKind, TextRegion};
pub use health::{HealthCheck, HealthStatus};
pub use metrics::ServiceMetrics;
pub use pipeline::TranslatePipeline;
pub use store::{
    BatchEntry, BatchRecord, BatchStatus, MetadataStore, QuotaDecision, TranslationRecord,
    TranslationStatus, UploadRecord,
};
pub use worker::WorkerEngine;
