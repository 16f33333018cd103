use std::sync::Arc;

use super::processor::CommandProcessor;
use crate::feature_switch::FeatureSwitchRegistry;
use crate::handler::HandlerRegistry;
use crate::mapper::MessageMapperRegistry;
use crate::outbox::OutboxProducerMediator;
use crate::pipeline::PipelineBuilder;
use crate::policy::PolicyRegistry;
use crate::steps::InboxConfiguration;

/// Wires a [`CommandProcessor`].
///
/// Only handlers are needed for in-process dispatch. Mappers and an outbox
/// are needed for `deposit_post`/`clear_outbox`/`post`.
#[derive(Default)]
pub struct CommandProcessorBuilder {
    handlers: HandlerRegistry,
    mappers: MessageMapperRegistry,
    policies: Option<PolicyRegistry>,
    feature_switches: Option<FeatureSwitchRegistry>,
    inbox: Option<InboxConfiguration>,
    mediator: Option<Arc<OutboxProducerMediator>>,
}

impl CommandProcessor {
    pub fn builder() -> CommandProcessorBuilder {
        CommandProcessorBuilder::default()
    }
}

impl CommandProcessorBuilder {
    pub fn handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn mappers(mut self, mappers: MessageMapperRegistry) -> Self {
        self.mappers = mappers;
        self
    }

    /// Policies used by the retry and circuit breaker steps. Defaults to
    /// [`PolicyRegistry::with_defaults`].
    pub fn policies(mut self, policies: PolicyRegistry) -> Self {
        self.policies = Some(policies);
        self
    }

    pub fn feature_switches(mut self, switches: FeatureSwitchRegistry) -> Self {
        self.feature_switches = Some(switches);
        self
    }

    /// Add a once-only step to every handler that does not declare its own.
    pub fn inbox(mut self, inbox: InboxConfiguration) -> Self {
        self.inbox = Some(inbox);
        self
    }

    /// The outbox mediator. Pass the same `Arc` to an
    /// [`OutboxSweeper`](crate::outbox::OutboxSweeper) to recover messages
    /// this processor deposits.
    pub fn outbox(mut self, mediator: Arc<OutboxProducerMediator>) -> Self {
        self.mediator = Some(mediator);
        self
    }

    pub fn build(self) -> CommandProcessor {
        let pipelines = match self.inbox {
            Some(inbox) => PipelineBuilder::new().with_inbox(inbox),
            None => PipelineBuilder::new(),
        };
        CommandProcessor {
            handlers: self.handlers,
            pipelines,
            mappers: self.mappers,
            policies: Arc::new(self.policies.unwrap_or_else(PolicyRegistry::with_defaults)),
            feature_switches: self.feature_switches.map(Arc::new),
            mediator: self.mediator,
        }
    }
}
