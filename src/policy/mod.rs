//! Resilience policies referenced by name from pipeline steps.

mod circuit_breaker;
mod registry;
mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use registry::{PolicyRegistry, CIRCUIT_BREAKER, RETRY_POLICY};
pub use retry::RetryPolicy;
