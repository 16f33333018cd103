use std::time::Instant;

use tracing::{info, warn};

#[cfg(feature = "async")]
use async_trait::async_trait;

use crate::context::RequestContext;
use crate::handler::{HandlerResult, Next, RequestHandler};
#[cfg(feature = "async")]
use crate::handler::{AsyncNext, AsyncRequestHandler};
use crate::request::{type_name, Request};

/// Logs entry, exit, elapsed time and outcome of the rest of the chain.
#[derive(Clone, Debug, Default)]
pub struct RequestLogging;

impl RequestLogging {
    pub const NAME: &'static str = "RequestLogging";

    pub fn new() -> Self {
        Self
    }
}

fn report<R: Request>(request: &R, started: Instant, result: &HandlerResult) {
    let elapsed_ms = started.elapsed().as_millis() as u64;
    match result {
        Ok(outcome) => info!(
            request = type_name::<R>(),
            request_id = %request.id(),
            elapsed_ms,
            ?outcome,
            "request handled"
        ),
        Err(err) => warn!(
            request = type_name::<R>(),
            request_id = %request.id(),
            elapsed_ms,
            error = %err,
            "request failed"
        ),
    }
}

impl<R: Request> RequestHandler<R> for RequestLogging {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn handle(
        &mut self,
        request: &mut R,
        context: &mut RequestContext,
        next: &mut Next<'_, R>,
    ) -> HandlerResult {
        info!(request = type_name::<R>(), request_id = %request.id(), "handling request");
        let started = Instant::now();
        let result = next.run(request, context);
        report(request, started, &result);
        result
    }
}

#[cfg(feature = "async")]
#[async_trait]
impl<R: Request> AsyncRequestHandler<R> for RequestLogging {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn handle(
        &mut self,
        request: &mut R,
        context: &mut RequestContext,
        next: &mut AsyncNext<'_, R>,
    ) -> HandlerResult {
        info!(request = type_name::<R>(), request_id = %request.id(), "handling request");
        let started = Instant::now();
        let result = next.run(request, context).await;
        report(request, started, &result);
        result
    }
}
