//! In-memory transport: a broker with routing-key bound queues, its
//! consumer and a channel factory.

mod consumer;
mod in_memory;

pub use consumer::{InMemoryChannelFactory, InMemoryConsumer};
pub use in_memory::InMemoryBus;
