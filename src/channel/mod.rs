//! Channels: the single-consumer view of one subscription that a performer
//! reads from.

#[allow(clippy::module_inception)]
mod channel;
mod consumer;
mod error;

pub use channel::{Channel, ChannelFactory, ChannelHandle};
pub use consumer::MessageConsumer;
pub use error::ChannelError;
