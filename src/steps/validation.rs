use std::sync::Arc;

#[cfg(feature = "async")]
use async_trait::async_trait;

use crate::context::RequestContext;
use crate::handler::{HandlerError, HandlerResult, Next, RequestHandler};
#[cfg(feature = "async")]
use crate::handler::{AsyncNext, AsyncRequestHandler};
use crate::request::Request;

type Check<R> = Arc<dyn Fn(&R) -> Result<(), String> + Send + Sync>;

/// Rejects invalid requests before the body runs.
pub struct Validation<R: Request> {
    check: Check<R>,
}

impl<R: Request> Clone for Validation<R> {
    fn clone(&self) -> Self {
        Self {
            check: Arc::clone(&self.check),
        }
    }
}

impl<R: Request> Validation<R> {
    pub const NAME: &'static str = "Validation";

    pub fn new<F>(check: F) -> Self
    where
        F: Fn(&R) -> Result<(), String> + Send + Sync + 'static,
    {
        Self {
            check: Arc::new(check),
        }
    }
}

impl<R: Request> RequestHandler<R> for Validation<R> {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn handle(
        &mut self,
        request: &mut R,
        context: &mut RequestContext,
        next: &mut Next<'_, R>,
    ) -> HandlerResult {
        (self.check)(request).map_err(HandlerError::Validation)?;
        next.run(request, context)
    }
}

#[cfg(feature = "async")]
#[async_trait]
impl<R: Request> AsyncRequestHandler<R> for Validation<R> {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn handle(
        &mut self,
        request: &mut R,
        context: &mut RequestContext,
        next: &mut AsyncNext<'_, R>,
    ) -> HandlerResult {
        (self.check)(request).map_err(HandlerError::Validation)?;
        next.run(request, context).await
    }
}
