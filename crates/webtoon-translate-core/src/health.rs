//! Health monitoring for the translation service.
//!
//! Tracks per-component health (store, storage, providers, worker) and a
//! handful of process counters, and produces the report served by `/health`.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Health status levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All systems operational
    Healthy,
    /// Some issues but still operational
    Degraded,
    /// Critical issues, system may not be functioning
    Unhealthy,
}

impl Default for HealthStatus {
    fn default() -> Self {
        HealthStatus::Healthy
    }
}

/// Individual component health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// Component name
    pub name: String,
    /// Current status
    pub status: HealthStatus,
    /// Optional message
    pub message: Option<String>,
    /// Time since the last successful check (ms)
    pub last_success_ms: Option<u64>,
}

/// Overall health report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    /// Overall status (worst of all components)
    pub status: HealthStatus,
    /// Process uptime in seconds
    pub uptime_secs: f64,
    /// Individual component health
    pub components: Vec<ComponentHealth>,
    /// Translation jobs currently running
    pub active_jobs: usize,
    /// Images fully processed since start
    pub images_processed: u64,
}

/// Health check manager shared between the API server and the worker
pub struct HealthCheck {
    start_time: Instant,
    components: RwLock<HashMap<String, ComponentState>>,
    images_processed: AtomicU64,
    active_jobs: AtomicU64,
}

struct ComponentState {
    status: HealthStatus,
    message: Option<String>,
    last_success: Option<Instant>,
}

impl Default for HealthCheck {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthCheck {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            components: RwLock::new(HashMap::new()),
            images_processed: AtomicU64::new(0),
            active_jobs: AtomicU64::new(0),
        }
    }

    /// Register a component as healthy
    pub fn register_component(&self, name: &str) {
        let mut components = self.components.write();
        components.insert(
            name.to_string(),
            ComponentState {
                status: HealthStatus::Healthy,
                message: None,
                last_success: Some(Instant::now()),
            },
        );
        debug!("Registered health component: {}", name);
    }

    /// Update component status
    pub fn update_component(&self, name: &str, status: HealthStatus, message: Option<&str>) {
        let mut components = self.components.write();
        let now = Instant::now();

        if let Some(state) = components.get_mut(name) {
            let was_healthy = state.status == HealthStatus::Healthy;
            state.status = status;
            state.message = message.map(|s| s.to_string());
            if status == HealthStatus::Healthy {
                state.last_success = Some(now);
            }

            if was_healthy && status != HealthStatus::Healthy {
                warn!("Component {} became {:?}: {:?}", name, status, message);
            } else if !was_healthy && status == HealthStatus::Healthy {
                info!("Component {} recovered", name);
            }
        } else {
            components.insert(
                name.to_string(),
                ComponentState {
                    status,
                    message: message.map(|s| s.to_string()),
                    last_success: if status == HealthStatus::Healthy {
                        Some(now)
                    } else {
                        None
                    },
                },
            );
        }
    }

    pub fn mark_healthy(&self, name: &str) {
        self.update_component(name, HealthStatus::Healthy, None);
    }

    pub fn mark_degraded(&self, name: &str, message: &str) {
        self.update_component(name, HealthStatus::Degraded, Some(message));
    }

    pub fn mark_unhealthy(&self, name: &str, message: &str) {
        self.update_component(name, HealthStatus::Unhealthy, Some(message));
    }

    /// Record a fully processed image
    pub fn record_image(&self) {
        self.images_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn job_started(&self) {
        self.active_jobs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn job_finished(&self) {
        self.active_jobs.fetch_sub(1, Ordering::Relaxed);
    }

    /// Overall status is the worst of all component statuses
    pub fn status(&self) -> HealthStatus {
        let components = self.components.read();

        let mut worst = HealthStatus::Healthy;
        for state in components.values() {
            match state.status {
                HealthStatus::Unhealthy => return HealthStatus::Unhealthy,
                HealthStatus::Degraded => worst = HealthStatus::Degraded,
                HealthStatus::Healthy => {}
            }
        }
        worst
    }

    /// Generate a full health report
    pub fn report(&self) -> HealthReport {
        let components = self.components.read();
        let now = Instant::now();

        let mut component_health: Vec<ComponentHealth> = components
            .iter()
            .map(|(name, state)| ComponentHealth {
                name: name.clone(),
                status: state.status,
                message: state.message.clone(),
                last_success_ms: state.last_success.map(|t| (now - t).as_millis() as u64),
            })
            .collect();
        component_health.sort_by(|a, b| a.name.cmp(&b.name));

        HealthReport {
            status: self.status(),
            uptime_secs: self.start_time.elapsed().as_secs_f64(),
            components: component_health,
            active_jobs: self.active_jobs.load(Ordering::Relaxed) as usize,
            images_processed: self.images_processed.load(Ordering::Relaxed),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status() == HealthStatus::Healthy
    }

    /// Healthy or degraded still serves traffic
    pub fn is_operational(&self) -> bool {
        self.status() != HealthStatus::Unhealthy
    }
}
