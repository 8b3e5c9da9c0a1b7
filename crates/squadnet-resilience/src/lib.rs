//! Squadnet Resilience
//!
//! Failure isolation for tool-server traffic: an exponential-backoff
//! retry engine for transient failures, and one CLOSED/OPEN/HALF_OPEN
//! circuit breaker per tool server so an unhealthy server fails fast
//! instead of stalling every agent turn.

pub mod breaker;
pub mod retry;

pub use breaker::{BreakerManager, BreakerRejection, BreakerStats, CircuitBreaker, CircuitState};
pub use retry::{RetryEngine, RetryError, RetryableError};
