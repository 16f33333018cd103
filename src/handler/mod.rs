//! Handler traits, chain links and the registration table.
//!
//! A business handler implements [`Handle`] (or [`HandleAsync`]). Cross-cutting
//! behaviour is a [`RequestHandler`] link that receives the rest of the chain
//! as [`Next`] and decides whether to forward.

mod error;
#[allow(clippy::module_inception)]
mod handler;
mod registry;

#[cfg(feature = "async")]
mod async_handler;

pub use error::HandlerError;
pub(crate) use error::panic_message;
pub use handler::{Handle, HandlerResult, Next, Outcome, RequestHandler};
pub(crate) use handler::Terminal;
pub use registry::{HandlerRegistration, HandlerRegistry, StepDescriptor, Timing};

#[cfg(feature = "async")]
pub use async_handler::{AsyncNext, AsyncRequestHandler, HandleAsync};
#[cfg(feature = "async")]
pub(crate) use async_handler::AsyncTerminal;
#[cfg(feature = "async")]
pub use registry::{AsyncHandlerRegistration, AsyncStepDescriptor};
