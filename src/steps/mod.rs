//! Built-in pipeline steps.
//!
//! Every step implements both [`RequestHandler`](crate::handler::RequestHandler)
//! and, with the `async` feature, [`AsyncRequestHandler`](crate::handler::AsyncRequestHandler),
//! so the same prototype can be declared on sync and async registrations:
//!
//! ```ignore
//! use courier_rust::handler::{HandlerRegistration, StepDescriptor};
//! use courier_rust::steps::{RequestLogging, Retry, Validation};
//! use courier_rust::policy::RETRY_POLICY;
//!
//! let registration = HandlerRegistration::<PlaceOrder>::new("PlaceOrderHandler", || PlaceOrderHandler)
//!     .step(StepDescriptor::before(1, RequestLogging::new()))
//!     .step(StepDescriptor::before(2, Validation::new(|o: &PlaceOrder| o.check())))
//!     .step(StepDescriptor::before(3, Retry::new(RETRY_POLICY)));
//! ```

mod circuit_breaker;
mod fallback;
mod feature_switch;
mod inbox;
mod logging;
mod retry;
mod timeout;
mod validation;

pub use circuit_breaker::UseCircuitBreaker;
pub use fallback::Fallback;
pub use feature_switch::FeatureSwitchStep;
pub use inbox::{InboxConfiguration, OnceOnlyAction, UseInbox};
#[cfg(feature = "async")]
pub use inbox::UseInboxAsync;
pub use logging::RequestLogging;
pub use retry::Retry;
pub use timeout::Timeout;
pub use validation::Validation;
