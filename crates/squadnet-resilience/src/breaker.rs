//! Circuit breaker for tool-server traffic
//!
//! One breaker per tool server. The breaker monitors failures and
//! opens to block requests once a failure threshold is reached; after
//! a recovery timeout it admits a single probe in half-open state.

use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use squadnet_core::BreakerPolicy;
use squadnet_telemetry::{NetEvent, TelemetryCollector};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation, requests pass through
    Closed,
    /// Too many failures, requests are blocked
    Open,
    /// Testing recovery, one probe allowed at a time
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

/// Fail-fast rejection returned while the circuit blocks traffic
#[derive(Debug, Clone)]
pub struct BreakerRejection {
    /// Breaker (server) name
    pub name: String,
    /// Time until the next recovery probe is allowed
    pub retry_after: Duration,
}

/// Observable breaker statistics
#[derive(Debug, Clone, Serialize)]
pub struct BreakerStats {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: usize,
    pub success_count: usize,
    pub retry_after_secs: f64,
}

struct BreakerInner {
    state: CircuitState,
    failure_count: usize,
    success_count: usize,
    last_failure_time: Option<Instant>,
    probe_in_flight: bool,
}

/// Per-server circuit breaker
///
/// All state lives under a single mutex; every read and write goes
/// through it, so transitions appear atomic to observers. The breaker
/// never retries on its own; retry policy is composed outside so an
/// open circuit fails immediately while timeouts are retried.
pub struct CircuitBreaker {
    name: String,
    policy: BreakerPolicy,
    inner: Mutex<BreakerInner>,
    collector: Option<TelemetryCollector>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, policy: BreakerPolicy) -> Self {
        Self {
            name: name.into(),
            policy,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure_time: None,
                probe_in_flight: false,
            }),
            collector: None,
        }
    }

    /// Attach a telemetry collector for state-change events
    pub fn with_events(mut self, collector: TelemetryCollector) -> Self {
        self.collector = Some(collector);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ask the breaker whether a call may proceed
    ///
    /// In open state the first call after the recovery timeout flips
    /// the breaker to half-open and is admitted as the probe; further
    /// calls are rejected until the probe resolves.
    pub fn admit(&self) -> Result<(), BreakerRejection> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let elapsed = inner
                    .last_failure_time
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::ZERO);

                if elapsed >= self.policy.recovery_timeout() {
                    self.transition(&mut inner, CircuitState::HalfOpen);
                    inner.success_count = 0;
                    inner.probe_in_flight = true;
                    Ok(())
                } else {
                    Err(BreakerRejection {
                        name: self.name.clone(),
                        retry_after: self.policy.recovery_timeout() - elapsed,
                    })
                }
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    Err(BreakerRejection {
                        name: self.name.clone(),
                        retry_after: Duration::ZERO,
                    })
                } else {
                    inner.probe_in_flight = true;
                    Ok(())
                }
            }
        }
    }

    /// Record a successful call
    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.failure_count = 0;

        if inner.state == CircuitState::HalfOpen {
            inner.probe_in_flight = false;
            inner.success_count += 1;
            tracing::debug!(
                breaker = %self.name,
                successes = inner.success_count,
                needed = self.policy.success_threshold,
                "probe succeeded in half-open"
            );

            if inner.success_count >= self.policy.success_threshold {
                self.transition(&mut inner, CircuitState::Closed);
                inner.success_count = 0;
            }
        }
    }

    /// Record a failed call
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.failure_count += 1;
        inner.last_failure_time = Some(Instant::now());

        match inner.state {
            CircuitState::HalfOpen => {
                tracing::warn!(breaker = %self.name, "probe failed, reopening circuit");
                inner.probe_in_flight = false;
                inner.success_count = 0;
                self.transition(&mut inner, CircuitState::Open);
            }
            CircuitState::Closed if inner.failure_count >= self.policy.failure_threshold => {
                tracing::error!(
                    breaker = %self.name,
                    failures = inner.failure_count,
                    recovery_secs = self.policy.recovery_timeout_secs,
                    "failure threshold reached, opening circuit"
                );
                self.transition(&mut inner, CircuitState::Open);
            }
            _ => {
                tracing::warn!(
                    breaker = %self.name,
                    failures = inner.failure_count,
                    threshold = self.policy.failure_threshold,
                    "recorded failure"
                );
            }
        }
    }

    /// Current state
    pub fn state(&self) -> CircuitState {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).state
    }

    /// Snapshot of observable statistics
    pub fn stats(&self) -> BreakerStats {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let retry_after = if inner.state == CircuitState::Open {
            inner
                .last_failure_time
                .map(|t| {
                    self.policy
                        .recovery_timeout()
                        .saturating_sub(t.elapsed())
                        .as_secs_f64()
                })
                .unwrap_or(0.0)
        } else {
            0.0
        };

        BreakerStats {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            retry_after_secs: retry_after,
        }
    }

    /// Manually reset to closed
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.state != CircuitState::Closed {
            self.transition(&mut inner, CircuitState::Closed);
        }
        inner.failure_count = 0;
        inner.success_count = 0;
        inner.last_failure_time = None;
        inner.probe_in_flight = false;
    }

    fn transition(&self, inner: &mut BreakerInner, to: CircuitState) {
        let from = inner.state;
        inner.state = to;
        tracing::info!(breaker = %self.name, from = from.as_str(), to = to.as_str(), "circuit state change");
        if let Some(collector) = &self.collector {
            collector.emit(NetEvent::breaker_state_changed(
                &self.name,
                from.as_str(),
                to.as_str(),
            ));
        }
    }
}

/// Registry of breakers, one per tool server
pub struct BreakerManager {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    policy: BreakerPolicy,
    collector: Option<TelemetryCollector>,
}

impl BreakerManager {
    pub fn new(policy: BreakerPolicy) -> Self {
        Self {
            breakers: DashMap::new(),
            policy,
            collector: None,
        }
    }

    /// Attach a telemetry collector passed to every breaker created
    pub fn with_events(mut self, collector: TelemetryCollector) -> Self {
        self.collector = Some(collector);
        self
    }

    /// Get or create the breaker for a server
    pub fn get(&self, name: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                let breaker = CircuitBreaker::new(name, self.policy.clone());
                let breaker = match &self.collector {
                    Some(collector) => breaker.with_events(collector.clone()),
                    None => breaker,
                };
                Arc::new(breaker)
            })
            .clone()
    }

    /// Statistics for every breaker
    pub fn stats_all(&self) -> HashMap<String, BreakerStats> {
        self.breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().stats()))
            .collect()
    }

    /// Reset every breaker to closed
    pub fn reset_all(&self) {
        for entry in self.breakers.iter() {
            entry.value().reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> BreakerPolicy {
        BreakerPolicy {
            failure_threshold: 5,
            success_threshold: 2,
            recovery_timeout_secs: 60,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_after_threshold_failures() {
        let breaker = CircuitBreaker::new("aero", policy());

        for _ in 0..4 {
            breaker.admit().unwrap();
            breaker.record_failure();
            assert_eq!(breaker.state(), CircuitState::Closed);
        }

        breaker.admit().unwrap();
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_rejects_until_recovery_timeout() {
        let breaker = CircuitBreaker::new("aero", policy());
        for _ in 0..5 {
            breaker.record_failure();
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        let rejection = breaker.admit().unwrap_err();
        assert!(rejection.retry_after > Duration::ZERO);

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(breaker.admit().is_err());

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(breaker.admit().is_ok());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_closes_after_success_threshold() {
        let breaker = CircuitBreaker::new("aero", policy());
        for _ in 0..5 {
            breaker.record_failure();
        }
        tokio::time::advance(Duration::from_secs(61)).await;

        breaker.admit().unwrap();
        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        breaker.admit().unwrap();
        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_failure_reopens() {
        let breaker = CircuitBreaker::new("aero", policy());
        for _ in 0..5 {
            breaker.record_failure();
        }
        tokio::time::advance(Duration::from_secs(61)).await;

        breaker.admit().unwrap();
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);

        // failure restarts the recovery clock
        assert!(breaker.admit().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_allows_single_probe() {
        let breaker = CircuitBreaker::new("aero", policy());
        for _ in 0..5 {
            breaker.record_failure();
        }
        tokio::time::advance(Duration::from_secs(61)).await;

        assert!(breaker.admit().is_ok());
        // probe in flight: concurrent caller is rejected
        assert!(breaker.admit().is_err());

        breaker.record_success();
        // probe resolved: the next caller becomes the new probe
        assert!(breaker.admit().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_failure_count() {
        let breaker = CircuitBreaker::new("aero", policy());

        for _ in 0..4 {
            breaker.record_failure();
        }
        breaker.record_success();
        for _ in 0..4 {
            breaker.record_failure();
        }
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats() {
        let breaker = CircuitBreaker::new("aero", policy());
        breaker.record_failure();

        let stats = breaker.stats();
        assert_eq!(stats.name, "aero");
        assert_eq!(stats.state, CircuitState::Closed);
        assert_eq!(stats.failure_count, 1);
        assert_eq!(stats.retry_after_secs, 0.0);

        for _ in 0..4 {
            breaker.record_failure();
        }
        let stats = breaker.stats();
        assert_eq!(stats.state, CircuitState::Open);
        assert!(stats.retry_after_secs > 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_reset() {
        let breaker = CircuitBreaker::new("aero", policy());
        for _ in 0..5 {
            breaker.record_failure();
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        breaker.reset();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.admit().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_manager_get_or_create() {
        let manager = BreakerManager::new(policy());
        let a = manager.get("aero");
        let b = manager.get("aero");
        assert!(Arc::ptr_eq(&a, &b));

        let c = manager.get("weather");
        assert!(!Arc::ptr_eq(&a, &c));

        let stats = manager.stats_all();
        assert_eq!(stats.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manager_reset_all() {
        let manager = BreakerManager::new(policy());
        let breaker = manager.get("aero");
        for _ in 0..5 {
            breaker.record_failure();
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        manager.reset_all();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_change_events() {
        let collector = TelemetryCollector::new(16);
        let mut sub = collector.subscribe();
        let breaker = CircuitBreaker::new("aero", policy()).with_events(collector);

        for _ in 0..5 {
            breaker.record_failure();
        }

        let event = sub.recv().await.unwrap();
        assert_eq!(event.class(), "breaker.state_change");
    }
}
