pub mod bus;
pub mod channel;
pub mod config;
pub mod context;
mod error;
pub mod feature_switch;
pub mod handler;
pub mod inbox;
pub mod lock;
pub mod logging;
pub mod mapper;
pub mod message;
pub mod outbox;
pub mod pipeline;
pub mod policy;
pub mod processor;
pub mod producer;
pub mod pump;
mod request;
pub mod steps;

pub use bus::{InMemoryBus, InMemoryChannelFactory, InMemoryConsumer};
pub use channel::{Channel, ChannelError, ChannelFactory, ChannelHandle, MessageConsumer};
pub use config::{Settings, SettingsError};
pub use context::{CancellationHandle, RequestContext};
pub use error::ConfigurationError;
pub use feature_switch::{FeatureSwitch, FeatureSwitchRegistry};
pub use handler::{
    Handle, HandlerError, HandlerRegistration, HandlerRegistry, HandlerResult, Next, Outcome,
    RequestHandler, StepDescriptor, Timing,
};
pub use inbox::{InMemoryInbox, Inbox, InboxError};
pub use lock::{DistributedLock, InMemoryDistributedLock, LockError};
pub use logging::init_tracing;
pub use mapper::{JsonMessageMapper, MappingError, MessageMapper, MessageMapperRegistry, Publication};
pub use message::{Message, MessageBody, MessageHeader, MessageType};
pub use outbox::{
    ClearReport, InMemoryOutbox, InMemoryTransaction, Outbox, OutboxEntry, OutboxError,
    OutboxLimits, OutboxProducerMediator, OutboxSweeper, SweepStats, SweeperConfig,
    SweeperThread, Transaction,
};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use policy::{CircuitBreaker, CircuitState, PolicyRegistry, RetryPolicy};
pub use processor::{CommandProcessor, CommandProcessorBuilder, HandlerFailure, ProcessorError};
pub use producer::{LogProducer, MessageProducer, ProducerError, ProducerRegistry};
pub use pump::{
    Dispatcher, DispatcherConfig, DispatcherError, DispatcherState, MessageDispatch,
    MissingInfrastructure, Performer, PerformerExit, PerformerStats, RequestRoute, Subscription,
    SubscriptionStatus,
};
pub use request::{Command, Event, Request, RequestKind};

// Async surface, behind the default `async` feature
#[cfg(feature = "async")]
pub use handler::{AsyncHandlerRegistration, AsyncNext, AsyncRequestHandler, AsyncStepDescriptor, HandleAsync};
#[cfg(feature = "async")]
pub use inbox::AsyncInbox;
#[cfg(feature = "async")]
pub use outbox::AsyncOutbox;
#[cfg(feature = "async")]
pub use pipeline::AsyncPipeline;
#[cfg(feature = "async")]
pub use producer::AsyncMessageProducer;

// Re-exported so handler crates need not depend on async-trait directly
#[cfg(feature = "async")]
pub use async_trait::async_trait;
