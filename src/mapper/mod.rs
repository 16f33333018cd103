//! Request/message mapping.

mod error;
#[allow(clippy::module_inception)]
mod mapper;
mod registry;

pub use error::MappingError;
pub use mapper::{JsonMessageMapper, MessageMapper, Publication};
pub use registry::MessageMapperRegistry;
