//! Message producers: the outbound side of a transport.

mod error;
mod log;
#[allow(clippy::module_inception)]
mod producer;

pub use error::ProducerError;
pub use log::LogProducer;
pub use producer::{MessageProducer, ProducerRegistry};
#[cfg(feature = "async")]
pub use producer::AsyncMessageProducer;
