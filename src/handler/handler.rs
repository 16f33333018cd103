use std::time::Duration;

use super::error::HandlerError;
use crate::context::RequestContext;
use crate::request::Request;

/// How a pipeline finished.
///
/// Errors are reserved for genuine failures; asking for redelivery or refusing
/// a message is a normal outcome the pump branches on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The request was handled, or a step decided it needs no handling.
    Completed,
    /// Not ready yet: redeliver later.
    Defer { delay: Option<Duration> },
    /// Never deliver this again.
    Reject { reason: String },
}

impl Outcome {
    pub fn defer() -> Self {
        Outcome::Defer { delay: None }
    }

    pub fn defer_for(delay: Duration) -> Self {
        Outcome::Defer { delay: Some(delay) }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Outcome::Reject {
            reason: reason.into(),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed)
    }
}

pub type HandlerResult = Result<Outcome, HandlerError>;

/// Business logic for one request type: the body at the end of a pipeline.
///
/// A fresh instance is created for every dispatch, so `&mut self` state never
/// leaks between two requests.
pub trait Handle<R: Request>: Send {
    fn handle(&mut self, request: &mut R, context: &mut RequestContext) -> HandlerResult;
}

impl<R, F> Handle<R> for F
where
    R: Request,
    F: FnMut(&mut R, &mut RequestContext) -> HandlerResult + Send,
{
    fn handle(&mut self, request: &mut R, context: &mut RequestContext) -> HandlerResult {
        self(request, context)
    }
}

/// One link of a pipeline.
///
/// A link does its work and forwards with `next.run(..)`; returning without
/// calling `next` short-circuits everything after it.
pub trait RequestHandler<R: Request>: Send {
    fn name(&self) -> &str;

    fn handle(
        &mut self,
        request: &mut R,
        context: &mut RequestContext,
        next: &mut Next<'_, R>,
    ) -> HandlerResult;
}

/// The remainder of a pipeline after the current link.
pub struct Next<'a, R: Request> {
    rest: &'a mut [Box<dyn RequestHandler<R>>],
}

impl<'a, R: Request> Next<'a, R> {
    pub(crate) fn new(rest: &'a mut [Box<dyn RequestHandler<R>>]) -> Self {
        Self { rest }
    }

    /// Invoke the rest of the chain. May be called more than once (retries).
    pub fn run(&mut self, request: &mut R, context: &mut RequestContext) -> HandlerResult {
        match self.rest.split_first_mut() {
            Some((head, tail)) => head.handle(request, context, &mut Next { rest: tail }),
            None => Ok(Outcome::Completed),
        }
    }

    /// Names of the links still ahead.
    pub fn remaining(&self) -> Vec<&str> {
        self.rest.iter().map(|link| link.name()).collect()
    }
}

/// Link that runs the business handler, then forwards to the `After` steps.
pub(crate) struct Terminal<R: Request> {
    name: String,
    body: Box<dyn Handle<R>>,
}

impl<R: Request> Terminal<R> {
    pub(crate) fn new(name: impl Into<String>, body: Box<dyn Handle<R>>) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }
}

impl<R: Request> RequestHandler<R> for Terminal<R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(
        &mut self,
        request: &mut R,
        context: &mut RequestContext,
        next: &mut Next<'_, R>,
    ) -> HandlerResult {
        match self.body.handle(request, context)? {
            Outcome::Completed => next.run(request, context),
            other => Ok(other),
        }
    }
}
