use crate::context::RequestContext;
use crate::handler::{HandlerResult, Next, RequestHandler};
#[cfg(feature = "async")]
use crate::handler::{AsyncNext, AsyncRequestHandler};
use crate::request::Request;

/// A composed chain for one handler, built fresh for one dispatch.
pub struct Pipeline<R: Request> {
    handler: String,
    links: Vec<Box<dyn RequestHandler<R>>>,
}

impl<R: Request> Pipeline<R> {
    pub(crate) fn new(handler: String, links: Vec<Box<dyn RequestHandler<R>>>) -> Self {
        Self { handler, links }
    }

    pub fn handler_name(&self) -> &str {
        &self.handler
    }

    /// Link names in execution order, the body included.
    pub fn describe(&self) -> Vec<String> {
        self.links.iter().map(|link| link.name().to_string()).collect()
    }

    pub fn run(&mut self, request: &mut R, context: &mut RequestContext) -> HandlerResult {
        Next::new(&mut self.links).run(request, context)
    }
}

#[cfg(feature = "async")]
pub struct AsyncPipeline<R: Request> {
    handler: String,
    links: Vec<Box<dyn AsyncRequestHandler<R>>>,
}

#[cfg(feature = "async")]
impl<R: Request> AsyncPipeline<R> {
    pub(crate) fn new(handler: String, links: Vec<Box<dyn AsyncRequestHandler<R>>>) -> Self {
        Self { handler, links }
    }

    pub fn handler_name(&self) -> &str {
        &self.handler
    }

    pub fn describe(&self) -> Vec<String> {
        self.links.iter().map(|link| link.name().to_string()).collect()
    }

    pub async fn run(&mut self, request: &mut R, context: &mut RequestContext) -> HandlerResult {
        AsyncNext::new(&mut self.links).run(request, context).await
    }
}
