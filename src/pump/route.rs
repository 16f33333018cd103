use std::marker::PhantomData;
use std::sync::Arc;

use crate::context::RequestContext;
use crate::error::ConfigurationError;
use crate::handler::Outcome;
use crate::message::{Message, MessageType};
use crate::processor::{CommandProcessor, ProcessorError};
use crate::request::{type_name, Command, Event, Request, RequestKind};

/// Turns a received message back into a typed request and dispatches it.
///
/// One route is bound to each subscription. Routes are the only place where
/// the pump learns the concrete request type.
pub trait MessageDispatch: Send + Sync {
    fn request_type(&self) -> &'static str;

    fn kind(&self) -> RequestKind;

    fn dispatch(
        &self,
        processor: &CommandProcessor,
        message: &Message,
        context: RequestContext,
    ) -> Result<Outcome, ProcessorError>;
}

/// Constructors for the built-in routes.
pub struct RequestRoute;

impl RequestRoute {
    /// Map to `R` and `send` it. Accepts command messages only.
    pub fn command<R: Command>() -> Arc<dyn MessageDispatch> {
        Arc::new(CommandRoute::<R> {
            _request: PhantomData,
        })
    }

    /// Map to `R` and `publish` it. Accepts event and document messages.
    pub fn event<R: Event>() -> Arc<dyn MessageDispatch> {
        Arc::new(EventRoute::<R> {
            _request: PhantomData,
        })
    }
}

fn map<R: Request>(
    processor: &CommandProcessor,
    message: &Message,
    kind: RequestKind,
) -> Result<R, ProcessorError> {
    let accepted = match kind {
        RequestKind::Command => message.message_type() == MessageType::Command,
        RequestKind::Event => matches!(message.message_type(), MessageType::Event | MessageType::Document),
    };
    if !accepted {
        return Err(ConfigurationError::MessageTypeMismatch {
            found: message.message_type(),
            expected: match kind {
                RequestKind::Command => "command",
                RequestKind::Event => "event",
            },
        }
        .into());
    }
    let mapper = processor.mappers().mapper::<R>()?;
    Ok(mapper.map_to_request(message)?)
}

struct CommandRoute<R> {
    _request: PhantomData<fn() -> R>,
}

impl<R: Command> MessageDispatch for CommandRoute<R> {
    fn request_type(&self) -> &'static str {
        type_name::<R>()
    }

    fn kind(&self) -> RequestKind {
        RequestKind::Command
    }

    fn dispatch(
        &self,
        processor: &CommandProcessor,
        message: &Message,
        context: RequestContext,
    ) -> Result<Outcome, ProcessorError> {
        let mut request = map::<R>(processor, message, RequestKind::Command)?;
        processor.send_with_context(&mut request, context)
    }
}

struct EventRoute<R> {
    _request: PhantomData<fn() -> R>,
}

impl<R: Event> MessageDispatch for EventRoute<R> {
    fn request_type(&self) -> &'static str {
        type_name::<R>()
    }

    fn kind(&self) -> RequestKind {
        RequestKind::Event
    }

    fn dispatch(
        &self,
        processor: &CommandProcessor,
        message: &Message,
        context: RequestContext,
    ) -> Result<Outcome, ProcessorError> {
        let mut event = map::<R>(processor, message, RequestKind::Event)?;
        processor.publish_with_context(&mut event, context)
    }
}
