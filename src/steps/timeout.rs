use std::time::{Duration, Instant};

use tracing::warn;

#[cfg(feature = "async")]
use async_trait::async_trait;

use crate::context::RequestContext;
use crate::handler::{HandlerError, HandlerResult, Next, RequestHandler};
#[cfg(feature = "async")]
use crate::handler::{AsyncNext, AsyncRequestHandler};
use crate::request::Request;

/// Bounds the time spent in the rest of the chain.
///
/// The synchronous variant cannot interrupt a running handler. It arms the
/// context deadline so cooperative handlers can give up, and reports
/// [`HandlerError::Timeout`] when the budget was overrun. The async variant
/// drops the pending future at the deadline.
#[derive(Clone, Debug)]
pub struct Timeout {
    duration: Duration,
}

impl Timeout {
    pub const NAME: &'static str = "Timeout";

    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl<R: Request> RequestHandler<R> for Timeout {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn handle(
        &mut self,
        request: &mut R,
        context: &mut RequestContext,
        next: &mut Next<'_, R>,
    ) -> HandlerResult {
        let started = Instant::now();
        context.cancellation().set_deadline(started + self.duration);
        let result = next.run(request, context);
        if started.elapsed() >= self.duration {
            context.cancellation().cancel();
            warn!(
                request_id = %request.id(),
                timeout_ms = self.duration.as_millis() as u64,
                "handler overran its timeout"
            );
            return Err(HandlerError::Timeout(self.duration));
        }
        result
    }
}

#[cfg(feature = "async")]
#[async_trait]
impl<R: Request> AsyncRequestHandler<R> for Timeout {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn handle(
        &mut self,
        request: &mut R,
        context: &mut RequestContext,
        next: &mut AsyncNext<'_, R>,
    ) -> HandlerResult {
        context
            .cancellation()
            .set_deadline(Instant::now() + self.duration);
        let raced = tokio::time::timeout(self.duration, next.run(request, context)).await;
        match raced {
            Ok(result) => result,
            Err(_) => {
                context.cancellation().cancel();
                warn!(
                    request_id = %request.id(),
                    timeout_ms = self.duration.as_millis() as u64,
                    "handler timed out"
                );
                Err(HandlerError::Timeout(self.duration))
            }
        }
    }
}
