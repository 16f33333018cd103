use std::collections::HashMap;

use super::circuit_breaker::CircuitBreaker;
use super::retry::RetryPolicy;

/// Name of the retry policy installed by [`PolicyRegistry::with_defaults`].
pub const RETRY_POLICY: &str = "courier.retry";
/// Name of the circuit breaker installed by [`PolicyRegistry::with_defaults`].
pub const CIRCUIT_BREAKER: &str = "courier.circuit_breaker";

/// Named resilience policies, shared read-only across dispatches.
#[derive(Clone, Debug, Default)]
pub struct PolicyRegistry {
    retries: HashMap<String, RetryPolicy>,
    breakers: HashMap<String, CircuitBreaker>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        Self::new()
            .with_retry(RETRY_POLICY, RetryPolicy::default())
            .with_circuit_breaker(CircuitBreaker::new(
                CIRCUIT_BREAKER,
                5,
                std::time::Duration::from_secs(30),
            ))
    }

    pub fn with_retry(mut self, name: impl Into<String>, policy: RetryPolicy) -> Self {
        self.retries.insert(name.into(), policy);
        self
    }

    /// Register a breaker under its own name.
    pub fn with_circuit_breaker(mut self, breaker: CircuitBreaker) -> Self {
        self.breakers.insert(breaker.name().to_string(), breaker);
        self
    }

    pub fn retry(&self, name: &str) -> Option<&RetryPolicy> {
        self.retries.get(name)
    }

    pub fn circuit_breaker(&self, name: &str) -> Option<&CircuitBreaker> {
        self.breakers.get(name)
    }
}
