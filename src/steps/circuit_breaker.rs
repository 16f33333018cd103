#[cfg(feature = "async")]
use async_trait::async_trait;

use crate::context::RequestContext;
use crate::error::ConfigurationError;
use crate::handler::{HandlerError, HandlerResult, Next, RequestHandler};
#[cfg(feature = "async")]
use crate::handler::{AsyncNext, AsyncRequestHandler};
use crate::policy::CircuitBreaker;
use crate::request::Request;

/// Fails fast with [`HandlerError::BrokenCircuit`] while the named breaker is open.
#[derive(Clone, Debug)]
pub struct UseCircuitBreaker {
    policy: String,
}

impl UseCircuitBreaker {
    pub const NAME: &'static str = "UseCircuitBreaker";

    pub fn new(policy: impl Into<String>) -> Self {
        Self {
            policy: policy.into(),
        }
    }

    fn acquire(&self, context: &RequestContext) -> Result<CircuitBreaker, HandlerError> {
        let breaker = context
            .policies()
            .and_then(|registry| registry.circuit_breaker(&self.policy))
            .cloned()
            .ok_or_else(|| ConfigurationError::MissingPolicy(self.policy.clone()))?;
        if breaker.try_acquire() {
            Ok(breaker)
        } else {
            Err(HandlerError::BrokenCircuit(self.policy.clone()))
        }
    }
}

// Caller mistakes say nothing about the health of the dependency.
fn record(breaker: &CircuitBreaker, result: &HandlerResult) {
    match result {
        Ok(_) => breaker.record_success(),
        Err(HandlerError::Validation(_)) | Err(HandlerError::Configuration(_)) => {
            breaker.record_success()
        }
        Err(_) => breaker.record_failure(),
    }
}

impl<R: Request> RequestHandler<R> for UseCircuitBreaker {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn handle(
        &mut self,
        request: &mut R,
        context: &mut RequestContext,
        next: &mut Next<'_, R>,
    ) -> HandlerResult {
        let breaker = self.acquire(context)?;
        let result = next.run(request, context);
        record(&breaker, &result);
        result
    }
}

#[cfg(feature = "async")]
#[async_trait]
impl<R: Request> AsyncRequestHandler<R> for UseCircuitBreaker {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn handle(
        &mut self,
        request: &mut R,
        context: &mut RequestContext,
        next: &mut AsyncNext<'_, R>,
    ) -> HandlerResult {
        let breaker = self.acquire(context)?;
        let result = next.run(request, context).await;
        record(&breaker, &result);
        result
    }
}
