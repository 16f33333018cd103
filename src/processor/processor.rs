use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info_span, warn, Span};
use uuid::Uuid;

#[cfg(feature = "async")]
use futures::FutureExt;
#[cfg(feature = "async")]
use tracing::Instrument;

use super::error::{HandlerFailure, ProcessorError};
use crate::context::RequestContext;
use crate::error::ConfigurationError;
use crate::feature_switch::FeatureSwitchRegistry;
use crate::handler::{panic_message, HandlerError, HandlerRegistry, HandlerResult, Outcome};
use crate::mapper::MessageMapperRegistry;
use crate::message::Message;
use crate::outbox::{ClearReport, OutboxProducerMediator, Transaction};
use crate::pipeline::PipelineBuilder;
use crate::policy::PolicyRegistry;
use crate::request::{type_name, Command, Event, Request};

/// In-process mediator between callers and handlers, and the entry point to
/// the outbox.
///
/// Built once at startup by [`CommandProcessor::builder`] and shared
/// (usually behind an `Arc`) by callers and message pump performers. Every
/// dispatch builds fresh pipelines, so no handler state survives from one
/// call to the next.
pub struct CommandProcessor {
    pub(super) handlers: HandlerRegistry,
    pub(super) pipelines: PipelineBuilder,
    pub(super) mappers: MessageMapperRegistry,
    pub(super) policies: Arc<PolicyRegistry>,
    pub(super) feature_switches: Option<Arc<FeatureSwitchRegistry>>,
    pub(super) mediator: Option<Arc<OutboxProducerMediator>>,
}

fn dispatch_span<R: Request>(id: Uuid) -> Span {
    info_span!("courier.dispatch", request = type_name::<R>(), request_id = %id)
}

/// Folds the results of every pipeline of one publish.
///
/// Errors win over outcomes so that no failure is masked; otherwise the
/// first reject wins, then the first defer.
#[derive(Default)]
struct PublishTally {
    failures: Vec<HandlerFailure>,
    rejected: Option<String>,
    deferred: Option<Option<Duration>>,
}

impl PublishTally {
    fn record(&mut self, handler: &str, result: HandlerResult) {
        match result {
            Ok(Outcome::Completed) => {}
            Ok(Outcome::Defer { delay }) => {
                self.deferred.get_or_insert(delay);
            }
            Ok(Outcome::Reject { reason }) => {
                self.rejected.get_or_insert(reason);
            }
            Err(error) => {
                warn!(handler, error = %error, "event handler failed");
                self.failures.push(HandlerFailure {
                    handler: handler.to_string(),
                    error,
                });
            }
        }
    }

    fn finish(self) -> Result<Outcome, ProcessorError> {
        if !self.failures.is_empty() {
            return Err(ProcessorError::Aggregate(self.failures));
        }
        if let Some(reason) = self.rejected {
            return Ok(Outcome::Reject { reason });
        }
        Ok(match self.deferred {
            Some(delay) => Outcome::Defer { delay },
            None => Outcome::Completed,
        })
    }
}

impl CommandProcessor {
    pub fn mappers(&self) -> &MessageMapperRegistry {
        &self.mappers
    }

    pub fn policies(&self) -> &PolicyRegistry {
        &self.policies
    }

    pub fn mediator(&self) -> Option<&Arc<OutboxProducerMediator>> {
        self.mediator.as_ref()
    }

    pub fn pipelines(&self) -> &PipelineBuilder {
        &self.pipelines
    }

    /// Dispatch a command to its one handler.
    pub fn send<R: Command>(&self, request: &mut R) -> Result<Outcome, ProcessorError> {
        self.send_with_context(request, RequestContext::new())
    }

    /// Dispatch a command with a caller-built context. Registries the context
    /// does not carry are filled in from the processor.
    pub fn send_with_context<R: Command>(
        &self,
        request: &mut R,
        mut context: RequestContext,
    ) -> Result<Outcome, ProcessorError> {
        let span = dispatch_span::<R>(request.id());
        let _entered = span.enter();
        context.set_span(span.clone());

        let registration = single::<R, _>(self.handlers.registrations::<R>())?;
        let mut pipeline = self.pipelines.build(registration)?;
        context.adopt(&self.policies, self.feature_switches.as_ref());

        debug!(handler = pipeline.handler_name(), "sending");
        pipeline
            .run(request, &mut context)
            .map_err(|err| ProcessorError::from_handler(pipeline.handler_name(), err))
    }

    /// Dispatch an event to every handler registered for it.
    ///
    /// Each pipeline runs with its own fork of the context and a failure in
    /// one does not stop the others; a panicking pipeline counts as a
    /// failure. All failures are returned together as
    /// [`ProcessorError::Aggregate`].
    pub fn publish<R: Event>(&self, event: &mut R) -> Result<Outcome, ProcessorError> {
        self.publish_with_context(event, RequestContext::new())
    }

    pub fn publish_with_context<R: Event>(
        &self,
        event: &mut R,
        mut context: RequestContext,
    ) -> Result<Outcome, ProcessorError> {
        let span = dispatch_span::<R>(event.id());
        let _entered = span.enter();
        context.set_span(span.clone());

        // Every pipeline is built before any runs, so wiring mistakes fail
        // the publish with no handler executed.
        let mut pipelines = self
            .handlers
            .registrations::<R>()
            .iter()
            .map(|registration| self.pipelines.build(registration))
            .collect::<Result<Vec<_>, _>>()?;
        if pipelines.is_empty() {
            debug!("no handlers for event");
            return Ok(Outcome::Completed);
        }
        context.adopt(&self.policies, self.feature_switches.as_ref());

        let mut tally = PublishTally::default();
        for pipeline in &mut pipelines {
            let mut forked = context.fork();
            let result = catch_unwind(AssertUnwindSafe(|| pipeline.run(event, &mut forked)))
                .unwrap_or_else(|panic| Err(panicked(panic.as_ref())));
            tally.record(pipeline.handler_name(), result);
        }
        tally.finish()
    }

    /// Map a request to a message and write it to the outbox, inside the
    /// caller's transaction when one is given. Nothing is sent.
    pub fn deposit_post<R: Request>(
        &self,
        request: &R,
        transaction: Option<&dyn Transaction>,
    ) -> Result<Uuid, ProcessorError> {
        let mediator = self.require_mediator()?;
        let message = self.map_to_message(request)?;
        mediator.deposit(&message, transaction)?;
        Ok(message.id())
    }

    /// Deposit several requests. Stops at the first failure; ids deposited
    /// before it stay in the outbox (or in the transaction).
    pub fn deposit_post_batch<R: Request>(
        &self,
        requests: &[R],
        transaction: Option<&dyn Transaction>,
    ) -> Result<Vec<Uuid>, ProcessorError> {
        requests
            .iter()
            .map(|request| self.deposit_post(request, transaction))
            .collect()
    }

    /// Send the given outbox entries and mark them dispatched. Ids that are
    /// absent (rolled back) or already dispatched are skipped.
    pub fn clear_outbox(&self, ids: &[Uuid]) -> Result<ClearReport, ProcessorError> {
        Ok(self.require_mediator()?.clear(ids))
    }

    /// Deposit outside any transaction and clear straight away.
    pub fn post<R: Request>(&self, request: &R) -> Result<ClearReport, ProcessorError> {
        let id = self.deposit_post(request, None)?;
        self.clear_outbox(&[id])
    }

    fn require_mediator(&self) -> Result<&OutboxProducerMediator, ConfigurationError> {
        self.mediator.as_deref().ok_or(ConfigurationError::NoOutbox)
    }

    fn map_to_message<R: Request>(&self, request: &R) -> Result<Message, ProcessorError> {
        let mapper = self.mappers.mapper::<R>()?;
        let publication = self.mappers.publication::<R>()?;
        Ok(mapper.map_to_message(request, publication)?)
    }
}

#[cfg(feature = "async")]
impl CommandProcessor {
    pub async fn send_async<R: Command>(&self, request: &mut R) -> Result<Outcome, ProcessorError> {
        self.send_async_with_context(request, RequestContext::new()).await
    }

    pub async fn send_async_with_context<R: Command>(
        &self,
        request: &mut R,
        mut context: RequestContext,
    ) -> Result<Outcome, ProcessorError> {
        let span = dispatch_span::<R>(request.id());
        context.set_span(span.clone());

        async move {
            let registration = single::<R, _>(self.handlers.registrations_async::<R>())?;
            let mut pipeline = self.pipelines.build_async(registration)?;
            context.adopt(&self.policies, self.feature_switches.as_ref());

            debug!(handler = pipeline.handler_name(), "sending");
            let result = pipeline.run(request, &mut context).await;
            result.map_err(|err| ProcessorError::from_handler(pipeline.handler_name(), err))
        }
        .instrument(span)
        .await
    }

    pub async fn publish_async<R: Event>(&self, event: &mut R) -> Result<Outcome, ProcessorError> {
        self.publish_async_with_context(event, RequestContext::new()).await
    }

    /// Async publish. Pipelines run one after another, like [`publish`](Self::publish).
    pub async fn publish_async_with_context<R: Event>(
        &self,
        event: &mut R,
        mut context: RequestContext,
    ) -> Result<Outcome, ProcessorError> {
        let span = dispatch_span::<R>(event.id());
        context.set_span(span.clone());

        async move {
            let mut pipelines = self
                .handlers
                .registrations_async::<R>()
                .iter()
                .map(|registration| self.pipelines.build_async(registration))
                .collect::<Result<Vec<_>, _>>()?;
            if pipelines.is_empty() {
                debug!("no handlers for event");
                return Ok(Outcome::Completed);
            }
            context.adopt(&self.policies, self.feature_switches.as_ref());

            let mut tally = PublishTally::default();
            for pipeline in &mut pipelines {
                let mut forked = context.fork();
                let result = AssertUnwindSafe(pipeline.run(event, &mut forked))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| Err(panicked(panic.as_ref())));
                tally.record(pipeline.handler_name(), result);
            }
            tally.finish()
        }
        .instrument(span)
        .await
    }

    pub async fn deposit_post_async<R: Request>(
        &self,
        request: &R,
        transaction: Option<&dyn Transaction>,
    ) -> Result<Uuid, ProcessorError> {
        let mediator = self.require_mediator()?;
        let message = self.map_to_message(request)?;
        mediator.deposit_async(&message, transaction).await?;
        Ok(message.id())
    }

    pub async fn clear_outbox_async(&self, ids: &[Uuid]) -> Result<ClearReport, ProcessorError> {
        Ok(self.require_mediator()?.clear_async(ids).await)
    }

    pub async fn post_async<R: Request>(&self, request: &R) -> Result<ClearReport, ProcessorError> {
        let id = self.deposit_post_async(request, None).await?;
        self.clear_outbox_async(&[id]).await
    }
}

fn panicked(panic: &(dyn Any + Send)) -> HandlerError {
    HandlerError::Panicked(panic_message(panic))
}

/// The one registration a command may have.
fn single<R: Request, T>(registrations: &[T]) -> Result<&T, ConfigurationError> {
    match registrations {
        [one] => Ok(one),
        [] => Err(ConfigurationError::NoHandler {
            request: type_name::<R>(),
        }),
        many => Err(ConfigurationError::MultipleHandlers {
            request: type_name::<R>(),
            count: many.len(),
        }),
    }
}
