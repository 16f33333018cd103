use std::sync::Arc;

use tracing::warn;

#[cfg(feature = "async")]
use async_trait::async_trait;

use crate::context::{RequestContext, FALLBACK_CAUSE};
use crate::handler::{HandlerError, HandlerResult, Next, RequestHandler};
#[cfg(feature = "async")]
use crate::handler::{AsyncNext, AsyncRequestHandler};
use crate::request::Request;

type FallbackFn<R> = Arc<dyn Fn(&mut R, &mut RequestContext) -> HandlerResult + Send + Sync>;

/// Runs an alternate body when the rest of the chain fails.
///
/// The failure is recorded in the context bag under `fallback_cause` before
/// the alternate runs.
pub struct Fallback<R: Request> {
    fallback: FallbackFn<R>,
    only_broken_circuit: bool,
}

impl<R: Request> Clone for Fallback<R> {
    fn clone(&self) -> Self {
        Self {
            fallback: Arc::clone(&self.fallback),
            only_broken_circuit: self.only_broken_circuit,
        }
    }
}

impl<R: Request> Fallback<R> {
    pub const NAME: &'static str = "Fallback";

    pub fn new<F>(fallback: F) -> Self
    where
        F: Fn(&mut R, &mut RequestContext) -> HandlerResult + Send + Sync + 'static,
    {
        Self {
            fallback: Arc::new(fallback),
            only_broken_circuit: false,
        }
    }

    /// Only take over when a circuit breaker refused the call.
    pub fn only_broken_circuit(mut self) -> Self {
        self.only_broken_circuit = true;
        self
    }

    fn applies(&self, err: &HandlerError) -> bool {
        !err.is_configuration()
            && (!self.only_broken_circuit || matches!(err, HandlerError::BrokenCircuit(_)))
    }

    fn take_over(&self, err: HandlerError, request: &mut R, context: &mut RequestContext) -> HandlerResult {
        warn!(request_id = %request.id(), error = %err, "falling back");
        context.insert(FALLBACK_CAUSE, err.to_string());
        (self.fallback)(request, context)
    }
}

impl<R: Request> RequestHandler<R> for Fallback<R> {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn handle(
        &mut self,
        request: &mut R,
        context: &mut RequestContext,
        next: &mut Next<'_, R>,
    ) -> HandlerResult {
        match next.run(request, context) {
            Err(err) if self.applies(&err) => self.take_over(err, request, context),
            other => other,
        }
    }
}

#[cfg(feature = "async")]
#[async_trait]
impl<R: Request> AsyncRequestHandler<R> for Fallback<R> {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn handle(
        &mut self,
        request: &mut R,
        context: &mut RequestContext,
        next: &mut AsyncNext<'_, R>,
    ) -> HandlerResult {
        match next.run(request, context).await {
            Err(err) if self.applies(&err) => self.take_over(err, request, context),
            other => other,
        }
    }
}
