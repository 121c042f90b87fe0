//! Circuit breaker guarding outbound provider calls.
//!
//! Detection and translation providers sit on the other side of the network;
//! when one of them starts failing the breaker trips and jobs fail fast with
//! [`ProviderError::CircuitOpen`] instead of stacking up timeouts.

use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::ProviderError;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls proceed normally
    Closed,
    /// Calls are rejected until the cooldown elapses
    Open,
    /// Cooldown elapsed, probe calls are let through
    HalfOpen,
}

/// Circuit breaker tuning knobs
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Provider name used in logs and in `CircuitOpen` errors
    pub name: String,
    /// Consecutive failures that trip the circuit
    pub failure_threshold: u32,
    /// How long the circuit stays open before probing
    pub cooldown: Duration,
    /// Probe successes required to close again
    pub probe_successes: u32,
}

struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    probe_successes: u32,
    opened_at: Option<Instant>,
}

/// Failure tracker for a single provider
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                probe_successes: 0,
                opened_at: None,
            }),
        }
    }

    /// Current state, after applying any due open-to-half-open transition
    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock();
        self.advance_cooldown(&mut inner);
        inner.state
    }

    fn allows_request(&self) -> bool {
        let mut inner = self.inner.lock();
        self.advance_cooldown(&mut inner);
        inner.state != CircuitState::Open
    }

    fn on_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                inner.probe_successes += 1;
                debug!(
                    "[{}] Probe succeeded ({}/{})",
                    self.config.name, inner.probe_successes, self.config.probe_successes
                );
                if inner.probe_successes >= self.config.probe_successes {
                    info!("[{}] Circuit closed after successful probes", self.config.name);
                    inner.state = CircuitState::Closed;
                    inner.consecutive_failures = 0;
                    inner.probe_successes = 0;
                    inner.opened_at = None;
                }
            }
            CircuitState::Open => {}
        }
    }

    fn on_failure(&self) {
        let mut inner = self.inner.lock();
        inner.consecutive_failures += 1;

        match inner.state {
            CircuitState::Closed => {
                debug!(
                    "[{}] Failure recorded ({}/{})",
                    self.config.name, inner.consecutive_failures, self.config.failure_threshold
                );
                if inner.consecutive_failures >= self.config.failure_threshold {
                    warn!(
                        "[{}] Circuit opened after {} consecutive failures",
                        self.config.name, inner.consecutive_failures
                    );
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            CircuitState::HalfOpen => {
                warn!("[{}] Probe failed, circuit reopened", self.config.name);
                inner.state = CircuitState::Open;
                inner.probe_successes = 0;
                inner.opened_at = Some(Instant::now());
            }
            CircuitState::Open => {}
        }
    }

    fn advance_cooldown(&self, inner: &mut Inner) {
        if inner.state != CircuitState::Open {
            return;
        }
        let due = inner
            .opened_at
            .map(|t| t.elapsed() >= self.config.cooldown)
            .unwrap_or(true);
        if due {
            info!(
                "[{}] Cooldown elapsed ({:?}), probing",
                self.config.name, self.config.cooldown
            );
            inner.state = CircuitState::HalfOpen;
            inner.probe_successes = 0;
        }
    }

    /// Run a provider call through the breaker.
    ///
    /// An open circuit short-circuits to [`ProviderError::CircuitOpen`]
    /// without running the operation.
    pub async fn call<F, T>(&self, operation: F) -> std::result::Result<T, ProviderError>
    where
        F: std::future::Future<Output = std::result::Result<T, ProviderError>>,
    {
        if !self.allows_request() {
            return Err(ProviderError::CircuitOpen {
                provider: self.config.name.clone(),
            });
        }

        match operation.await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(e) => {
                self.on_failure();
                Err(e)
            }
        }
    }
}
