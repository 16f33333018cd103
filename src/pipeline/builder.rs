use std::collections::HashSet;

use tracing::trace;

use super::pipeline::Pipeline;
#[cfg(feature = "async")]
use super::pipeline::AsyncPipeline;
use crate::error::ConfigurationError;
use crate::handler::{HandlerRegistration, RequestHandler, Terminal, Timing};
#[cfg(feature = "async")]
use crate::handler::{AsyncHandlerRegistration, AsyncRequestHandler, AsyncTerminal};
use crate::request::Request;
use crate::steps::{InboxConfiguration, UseInbox};

/// Turns registrations into runnable chains.
///
/// Links run as: `Before` steps by ascending step number, the body, then
/// `After` steps by ascending step number. A duplicate `(step, timing)` pair
/// is a [`ConfigurationError`].
#[derive(Clone, Default)]
pub struct PipelineBuilder {
    inbox: Option<InboxConfiguration>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_inbox(mut self, inbox: InboxConfiguration) -> Self {
        self.inbox = Some(inbox);
        self
    }

    pub fn inbox(&self) -> Option<&InboxConfiguration> {
        self.inbox.as_ref()
    }

    pub fn build<R: Request>(
        &self,
        registration: &HandlerRegistration<R>,
    ) -> Result<Pipeline<R>, ConfigurationError> {
        let name = registration.name();
        let order = ordered(
            name,
            registration
                .steps()
                .iter()
                .map(|descriptor| (descriptor.step(), descriptor.timing())),
        )?;

        let steps = registration.steps();
        let mut before: Vec<Box<dyn RequestHandler<R>>> = Vec::new();
        let mut after: Vec<Box<dyn RequestHandler<R>>> = Vec::new();
        for index in order {
            let descriptor = &steps[index];
            match descriptor.timing() {
                Timing::Before => before.push(descriptor.create()),
                Timing::After => after.push(descriptor.create()),
            }
        }

        let declares_inbox = before
            .iter()
            .chain(after.iter())
            .any(|link| link.name() == UseInbox::NAME);
        let mut links: Vec<Box<dyn RequestHandler<R>>> = Vec::new();
        if !declares_inbox {
            if let Some(step) = self.inbox.as_ref().and_then(|inbox| inbox.step_for(name)) {
                links.push(Box::new(step));
            }
        }
        links.extend(before);
        links.push(Box::new(Terminal::new(name, registration.create_handler())));
        links.extend(after);

        trace!(handler = name, links = links.len(), "pipeline built");
        Ok(Pipeline::new(name.to_string(), links))
    }

    #[cfg(feature = "async")]
    pub fn build_async<R: Request>(
        &self,
        registration: &AsyncHandlerRegistration<R>,
    ) -> Result<AsyncPipeline<R>, ConfigurationError> {
        let name = registration.name();
        let order = ordered(
            name,
            registration
                .steps()
                .iter()
                .map(|descriptor| (descriptor.step(), descriptor.timing())),
        )?;

        let steps = registration.steps();
        let mut before: Vec<Box<dyn AsyncRequestHandler<R>>> = Vec::new();
        let mut after: Vec<Box<dyn AsyncRequestHandler<R>>> = Vec::new();
        for index in order {
            let descriptor = &steps[index];
            match descriptor.timing() {
                Timing::Before => before.push(descriptor.create()),
                Timing::After => after.push(descriptor.create()),
            }
        }

        let declares_inbox = before
            .iter()
            .chain(after.iter())
            .any(|link| link.name() == UseInbox::NAME);
        let mut links: Vec<Box<dyn AsyncRequestHandler<R>>> = Vec::new();
        if !declares_inbox {
            if let Some(step) = self.inbox.as_ref().and_then(|inbox| inbox.async_step_for(name)) {
                links.push(Box::new(step));
            }
        }
        links.extend(before);
        links.push(Box::new(AsyncTerminal::new(name, registration.create_handler())));
        links.extend(after);

        trace!(handler = name, links = links.len(), "async pipeline built");
        Ok(AsyncPipeline::new(name.to_string(), links))
    }
}

/// Indices of the declared steps in execution order.
fn ordered(
    handler: &str,
    declared: impl Iterator<Item = (u32, Timing)>,
) -> Result<Vec<usize>, ConfigurationError> {
    let mut seen = HashSet::new();
    let mut keyed = Vec::new();
    for (index, (step, timing)) in declared.enumerate() {
        if !seen.insert((step, timing)) {
            return Err(ConfigurationError::DuplicateStep {
                handler: handler.to_string(),
                step,
                timing,
            });
        }
        keyed.push((timing, step, index));
    }
    keyed.sort();
    Ok(keyed.into_iter().map(|(_, _, index)| index).collect())
}
