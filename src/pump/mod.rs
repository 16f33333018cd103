//! The message pump: performers that consume channels and the dispatcher
//! that supervises them.
//!
//! Each performer runs on its own thread and handles one message at a time,
//! so a subscription with one performer processes its messages strictly in
//! order. Several performers on one subscription compete for the same queue
//! and give no ordering guarantee.

mod dispatcher;
mod error;
mod performer;
mod route;
mod subscription;

pub use dispatcher::{Dispatcher, DispatcherBuilder, DispatcherConfig, DispatcherState, SubscriptionStatus};
pub use error::DispatcherError;
pub use performer::{Performer, PerformerExit, PerformerStats};
pub use route::{MessageDispatch, RequestRoute};
pub use subscription::{MissingInfrastructure, Subscription};
