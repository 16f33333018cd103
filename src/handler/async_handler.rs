use async_trait::async_trait;

use super::handler::{HandlerResult, Outcome};
use crate::context::RequestContext;
use crate::request::Request;

/// Asynchronous business handler. Same contract as [`Handle`](super::Handle),
/// with suspension points allowed.
#[async_trait]
pub trait HandleAsync<R: Request>: Send {
    async fn handle(&mut self, request: &mut R, context: &mut RequestContext) -> HandlerResult;
}

/// Asynchronous chain link.
#[async_trait]
pub trait AsyncRequestHandler<R: Request>: Send {
    fn name(&self) -> &str;

    async fn handle(
        &mut self,
        request: &mut R,
        context: &mut RequestContext,
        next: &mut AsyncNext<'_, R>,
    ) -> HandlerResult;
}

pub struct AsyncNext<'a, R: Request> {
    rest: &'a mut [Box<dyn AsyncRequestHandler<R>>],
}

impl<'a, R: Request> AsyncNext<'a, R> {
    pub(crate) fn new(rest: &'a mut [Box<dyn AsyncRequestHandler<R>>]) -> Self {
        Self { rest }
    }

    pub async fn run(&mut self, request: &mut R, context: &mut RequestContext) -> HandlerResult {
        match self.rest.split_first_mut() {
            Some((head, tail)) => {
                head.handle(request, context, &mut AsyncNext { rest: tail })
                    .await
            }
            None => Ok(Outcome::Completed),
        }
    }

    pub fn remaining(&self) -> Vec<&str> {
        self.rest.iter().map(|link| link.name()).collect()
    }
}

pub(crate) struct AsyncTerminal<R: Request> {
    name: String,
    body: Box<dyn HandleAsync<R>>,
}

impl<R: Request> AsyncTerminal<R> {
    pub(crate) fn new(name: impl Into<String>, body: Box<dyn HandleAsync<R>>) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }
}

#[async_trait]
impl<R: Request> AsyncRequestHandler<R> for AsyncTerminal<R> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(
        &mut self,
        request: &mut R,
        context: &mut RequestContext,
        next: &mut AsyncNext<'_, R>,
    ) -> HandlerResult {
        match self.body.handle(request, context).await? {
            Outcome::Completed => next.run(request, context).await,
            other => Ok(other),
        }
    }
}
