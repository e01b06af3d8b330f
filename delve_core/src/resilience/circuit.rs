//! Per-backend circuit breakers.
//!
//! # State Machine
//!
//! ```text
//!   Closed ──(failure_threshold consecutive failures)──> Open
//!   Open ──(reset_timeout since last failure)──> HalfOpen
//!   HalfOpen ──(success_threshold consecutive successes)──> Closed
//!   HalfOpen ──(any failure)──> Open
//! ```
//!
//! Counters reset on every transition.

use crate::config::CircuitConfig;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal: calls pass through.
    Closed,
    /// Tripped: calls are rejected.
    Open,
    /// Probing: calls pass through until the breaker closes or reopens.
    HalfOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub reset_timeout: Duration,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self::from(&CircuitConfig::default())
    }
}

impl From<&CircuitConfig> for BreakerSettings {
    fn from(config: &CircuitConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold.max(1),
            success_threshold: config.success_threshold.max(1),
            reset_timeout: Duration::from_secs(config.reset_timeout_secs),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CircuitError<E> {
    #[error("circuit open")]
    Open,
    #[error(transparent)]
    Inner(E),
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    last_failure: Option<Instant>,
}

impl BreakerInner {
    fn transition(&mut self, name: &str, to: CircuitState) {
        if self.state != to {
            info!(target: "delve.circuit", backend = name, from = ?self.state, to = ?to, "circuit transition");
        }
        self.state = to;
        self.consecutive_failures = 0;
        self.consecutive_successes = 0;
    }
}

pub struct CircuitBreaker {
    name: String,
    settings: BreakerSettings,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, settings: BreakerSettings) -> Self {
        Self {
            name: name.into(),
            settings,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                last_failure: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a call may proceed. Moves Open to HalfOpen once the reset
    /// timeout has passed since the last failure.
    pub fn allow(&self) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let cooled = self.cooled(&inner);
                if cooled {
                    inner.transition(&self.name, CircuitState::HalfOpen);
                }
                cooled
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match inner.state {
            CircuitState::Closed => inner.consecutive_failures = 0,
            CircuitState::HalfOpen => {
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.settings.success_threshold {
                    inner.transition(&self.name, CircuitState::Closed);
                }
            }
            // A call admitted before the breaker tripped; it says nothing new.
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.last_failure = Some(Instant::now());
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.settings.failure_threshold {
                    warn!(
                        target: "delve.circuit",
                        backend = %self.name,
                        failures = inner.consecutive_failures,
                        "circuit tripped"
                    );
                    inner.transition(&self.name, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => inner.transition(&self.name, CircuitState::Open),
            CircuitState::Open => {}
        }
    }

    /// State the next call would see. An Open breaker whose reset timeout
    /// has passed reports HalfOpen; the transition itself happens in `allow`.
    pub fn state(&self) -> CircuitState {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match inner.state {
            CircuitState::Open if self.cooled(&inner) => CircuitState::HalfOpen,
            state => state,
        }
    }

    fn cooled(&self, inner: &BreakerInner) -> bool {
        inner
            .last_failure
            .map_or(true, |at| at.elapsed() >= self.settings.reset_timeout)
    }

    /// Run `f` if the breaker admits it, recording the outcome.
    pub async fn execute<T, E, F, Fut>(&self, f: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.allow() {
            return Err(CircuitError::Open);
        }
        match f().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                self.record_failure();
                Err(CircuitError::Inner(e))
            }
        }
    }

    /// Like [`execute`](Self::execute), but an open circuit yields
    /// `fallback()` instead of an error.
    pub async fn execute_or<T, E, F, Fut, G>(&self, f: F, fallback: G) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        G: FnOnce() -> T,
    {
        match self.execute(f).await {
            Ok(value) => Ok(value),
            Err(CircuitError::Open) => Ok(fallback()),
            Err(CircuitError::Inner(e)) => Err(e),
        }
    }
}

/// Lazily created breakers, one per backend.
pub struct CircuitBreakers {
    settings: BreakerSettings,
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
}

impl CircuitBreakers {
    pub fn new(settings: BreakerSettings) -> Self {
        Self {
            settings,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, backend: &str) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            breakers
                .entry(backend.to_string())
                .or_insert_with(|| Arc::new(CircuitBreaker::new(backend, self.settings))),
        )
    }

    pub fn states(&self) -> BTreeMap<String, CircuitState> {
        let breakers = self.breakers.lock().unwrap_or_else(|e| e.into_inner());
        breakers
            .iter()
            .map(|(name, breaker)| (name.clone(), breaker.state()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(
            "openalex",
            BreakerSettings {
                failure_threshold: 3,
                success_threshold: 2,
                reset_timeout: Duration::from_secs(10),
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_state_cycle() {
        let cb = breaker();
        for _ in 0..3 {
            assert!(cb.allow());
            cb.record_failure();
        }
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.allow());

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(!cb.allow());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cb.allow());
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        // One failure in HalfOpen reopens immediately
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.allow());

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(cb.allow());
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_reports_half_open_once_cooled() {
        let cb = breaker();
        for _ in 0..3 {
            cb.record_failure();
        }
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        // Reading the state does not admit or count anything
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(cb.allow());
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn test_success_resets_failure_streak() {
        let cb = breaker();
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_execute_reports_open() {
        let cb = breaker();
        for _ in 0..3 {
            let r: Result<(), _> = cb.execute(|| async { Err::<(), _>("down") }).await;
            assert!(matches!(r, Err(CircuitError::Inner("down"))));
        }
        let r = cb.execute(|| async { Ok::<_, &str>(1) }).await;
        assert!(matches!(r, Err(CircuitError::Open)));
    }

    #[tokio::test]
    async fn test_execute_or_uses_fallback_when_open() {
        let cb = breaker();
        for _ in 0..3 {
            cb.record_failure();
        }
        let value = cb
            .execute_or(|| async { Ok::<_, &str>(vec![1]) }, Vec::new)
            .await
            .unwrap();
        assert!(value.is_empty());
    }

    #[test]
    fn test_registry_creates_lazily() {
        let breakers = CircuitBreakers::new(BreakerSettings::default());
        assert!(breakers.states().is_empty());
        let a = breakers.get("exa");
        let b = breakers.get("exa");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(breakers.states().get("exa"), Some(&CircuitState::Closed));
    }
}
