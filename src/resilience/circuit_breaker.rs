//! Count-based circuit breaker guarding calls to a remote dependency.
//!
//! The breaker is a cheap `Clone` handle; all clones share one state machine,
//! so a single instance can be shared across concurrent callers. The state lock
//! is only held to take a permit and to record an outcome, never across the
//! guarded future.

use crate::error::{OrchestratorError, Result as CrateResult};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls pass through and outcomes are recorded.
    Closed,
    /// Calls are rejected without reaching the remote.
    Open,
    /// A limited number of trial calls probe the remote.
    HalfOpen,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BreakerError<E> {
    #[error("circuit breaker is open")]
    Rejected,
    #[error(transparent)]
    Inner(E),
}

#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Number of most recent outcomes kept in the rolling window.
    pub window_size: usize,
    /// Outcomes needed in the window before the failure rate is evaluated.
    pub minimum_calls: usize,
    /// Failure rate, in percent, at or above which the breaker opens.
    pub failure_rate_threshold: u8,
    /// How long the breaker stays open before admitting trial calls.
    pub open_cooldown: Duration,
    /// Trial calls admitted while half-open; this many successes close it.
    pub half_open_max_calls: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            window_size: 100,
            minimum_calls: 10,
            failure_rate_threshold: 50,
            open_cooldown: Duration::from_secs(60),
            half_open_max_calls: 3,
        }
    }
}

impl BreakerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.window_size == 0 {
            return Err("Breaker window size cannot be 0".to_string());
        }
        if self.minimum_calls == 0 || self.minimum_calls > self.window_size {
            return Err("Breaker minimum calls must be within 1..=window size".to_string());
        }
        if self.failure_rate_threshold == 0 || self.failure_rate_threshold > 100 {
            return Err("Breaker failure rate threshold must be within 1..=100".to_string());
        }
        if self.half_open_max_calls == 0 {
            return Err("Breaker half-open calls cannot be 0".to_string());
        }
        Ok(())
    }
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    /// `true` marks a failed call.
    window: VecDeque<bool>,
    failures: usize,
    opened_at: Option<Instant>,
    trials_in_flight: u32,
    trial_successes: u32,
}

impl Inner {
    fn new(state: CircuitState, window_size: usize) -> Self {
        Self {
            state,
            window: VecDeque::with_capacity(window_size),
            failures: 0,
            opened_at: (state == CircuitState::Open).then(Instant::now),
            trials_in_flight: 0,
            trial_successes: 0,
        }
    }

    fn clear_window(&mut self) {
        self.window.clear();
        self.failures = 0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PermitKind {
    Normal,
    Trial,
}

/// Shared circuit breaker state machine.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    name: Arc<str>,
    config: Arc<BreakerConfig>,
    inner: Arc<Mutex<Inner>>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> CrateResult<Self> {
        Self::with_state(name, config, CircuitState::Closed)
    }

    /// Creates a breaker starting in `state`. An `Open` start begins its
    /// cooldown now. Fails if `config` does not pass [`BreakerConfig::validate`].
    pub fn with_state(
        name: impl Into<String>,
        config: BreakerConfig,
        state: CircuitState,
    ) -> CrateResult<Self> {
        config.validate().map_err(OrchestratorError::ValidationError)?;
        let inner = Inner::new(state, config.window_size);
        Ok(Self {
            name: Arc::from(name.into()),
            config: Arc::new(config),
            inner: Arc::new(Mutex::new(inner)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state. An `Open` breaker whose cooldown elapsed still reports
    /// `Open` until the next call probes it.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn is_call_permitted(&self) -> bool {
        let inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => self.cooldown_elapsed(&inner),
            CircuitState::HalfOpen => inner.trials_in_flight < self.config.half_open_max_calls,
        }
    }

    /// Runs `fut` through the breaker, counting every `Err` as a failure.
    pub async fn call<F, T, E>(&self, fut: F) -> Result<T, BreakerError<E>>
    where
        F: Future<Output = Result<T, E>>,
    {
        self.call_with(|_| true, fut).await
    }

    /// Runs `fut` through the breaker. Errors for which `is_failure` returns
    /// `false` are passed back to the caller but recorded as successes.
    ///
    /// A rejected call never polls `fut`.
    pub async fn call_with<P, F, T, E>(&self, is_failure: P, fut: F) -> Result<T, BreakerError<E>>
    where
        P: FnOnce(&E) -> bool,
        F: Future<Output = Result<T, E>>,
    {
        let Some(mut permit) = self.acquire() else {
            return Err(BreakerError::Rejected);
        };

        let result = fut.await;
        let failed = match &result {
            Ok(_) => false,
            Err(e) => is_failure(e),
        };
        permit.record(failed);

        result.map_err(BreakerError::Inner)
    }

    fn cooldown_elapsed(&self, inner: &Inner) -> bool {
        inner
            .opened_at
            .is_none_or(|opened| opened.elapsed() >= self.config.open_cooldown)
    }

    fn acquire(&self) -> Option<Permit<'_>> {
        let mut inner = self.inner.lock();

        if inner.state == CircuitState::Open {
            if !self.cooldown_elapsed(&inner) {
                return None;
            }
            inner.state = CircuitState::HalfOpen;
            inner.trials_in_flight = 0;
            inner.trial_successes = 0;
            info!(breaker = %self.name, "Circuit breaker half-open, admitting trial calls");
        }

        let kind = match inner.state {
            CircuitState::Closed => PermitKind::Normal,
            CircuitState::HalfOpen => {
                if inner.trials_in_flight >= self.config.half_open_max_calls {
                    return None;
                }
                inner.trials_in_flight += 1;
                PermitKind::Trial
            }
            CircuitState::Open => return None,
        };

        Some(Permit {
            breaker: self,
            kind,
            recorded: false,
        })
    }

    fn record_normal(&self, inner: &mut Inner, failed: bool) {
        // Outcomes of calls admitted before the breaker opened are dropped.
        if inner.state != CircuitState::Closed {
            return;
        }

        if inner.window.len() == self.config.window_size
            && let Some(evicted) = inner.window.pop_front()
            && evicted
        {
            inner.failures -= 1;
        }
        inner.window.push_back(failed);
        if failed {
            inner.failures += 1;
        }

        let recorded = inner.window.len();
        if recorded >= self.config.minimum_calls
            && inner.failures * 100 >= usize::from(self.config.failure_rate_threshold) * recorded
        {
            warn!(
                breaker = %self.name,
                failures = inner.failures,
                calls = recorded,
                "Circuit breaker opened"
            );
            self.open(inner);
        }
    }

    fn record_trial(&self, inner: &mut Inner, failed: bool) {
        inner.trials_in_flight = inner.trials_in_flight.saturating_sub(1);
        if inner.state != CircuitState::HalfOpen {
            return;
        }

        if failed {
            warn!(breaker = %self.name, "Trial call failed, circuit breaker re-opened");
            self.open(inner);
            return;
        }

        inner.trial_successes += 1;
        if inner.trial_successes >= self.config.half_open_max_calls {
            inner.state = CircuitState::Closed;
            inner.opened_at = None;
            inner.clear_window();
            info!(breaker = %self.name, "Circuit breaker closed");
        }
    }

    fn open(&self, inner: &mut Inner) {
        inner.state = CircuitState::Open;
        inner.opened_at = Some(Instant::now());
        inner.trials_in_flight = 0;
        inner.trial_successes = 0;
        inner.clear_window();
    }
}

/// Admission ticket for one guarded call. Dropping it unrecorded (the caller
/// was cancelled) frees a trial slot without counting an outcome.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    kind: PermitKind,
    recorded: bool,
}

impl Permit<'_> {
    fn record(&mut self, failed: bool) {
        self.recorded = true;
        let mut inner = self.breaker.inner.lock();
        match self.kind {
            PermitKind::Normal => self.breaker.record_normal(&mut inner, failed),
            PermitKind::Trial => self.breaker.record_trial(&mut inner, failed),
        }
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.recorded && self.kind == PermitKind::Trial {
            let mut inner = self.breaker.inner.lock();
            inner.trials_in_flight = inner.trials_in_flight.saturating_sub(1);
        }
    }
}
