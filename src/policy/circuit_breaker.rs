use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct BreakerState {
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

/// Circuit breaker shared by every pipeline that names it.
///
/// Clones share state. After `failure_threshold` consecutive failures the
/// circuit opens; once `break_duration` has elapsed a single trial call is let
/// through (half-open) and its result closes or re-opens the circuit.
#[derive(Clone, Debug)]
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    break_duration: Duration,
    state: Arc<Mutex<BreakerState>>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, failure_threshold: u32, break_duration: Duration) -> Self {
        Self {
            name: name.into(),
            failure_threshold: failure_threshold.max(1),
            break_duration,
            state: Arc::new(Mutex::new(BreakerState {
                consecutive_failures: 0,
                opened_at: None,
                trial_in_flight: false,
            })),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn guard(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> CircuitState {
        let state = self.guard();
        match state.opened_at {
            None => CircuitState::Closed,
            Some(opened) if opened.elapsed() >= self.break_duration => CircuitState::HalfOpen,
            Some(_) => CircuitState::Open,
        }
    }

    /// Ask to make a call. Returns false while the circuit is open.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.guard();
        match state.opened_at {
            None => true,
            Some(opened) if opened.elapsed() >= self.break_duration => {
                if state.trial_in_flight {
                    false
                } else {
                    state.trial_in_flight = true;
                    true
                }
            }
            Some(_) => false,
        }
    }

    pub fn record_success(&self) {
        let mut state = self.guard();
        state.consecutive_failures = 0;
        state.opened_at = None;
        state.trial_in_flight = false;
    }

    pub fn record_failure(&self) {
        let mut state = self.guard();
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        let trial_failed = state.trial_in_flight;
        state.trial_in_flight = false;
        if trial_failed || state.consecutive_failures >= self.failure_threshold {
            if state.opened_at.is_none() || trial_failed {
                warn!(
                    circuit = %self.name,
                    failures = state.consecutive_failures,
                    "circuit opened"
                );
            }
            state.opened_at = Some(Instant::now());
        }
    }
}
