//! The command processor: in-process dispatch and the outbox entry points.
//!
//! ## Example
//!
//! ```ignore
//! let mut handlers = HandlerRegistry::new();
//! handlers.register::<PlaceOrder, _, _>(|| PlaceOrderHandler);
//!
//! let processor = CommandProcessor::builder()
//!     .handlers(handlers)
//!     .mappers(mappers)
//!     .outbox(Arc::new(mediator))
//!     .build();
//!
//! processor.send(&mut PlaceOrder::new("o-1"))?;
//!
//! let tx = outbox.begin();
//! let id = processor.deposit_post(&OrderPlaced::new("o-1"), Some(&tx))?;
//! tx.commit()?;
//! processor.clear_outbox(&[id])?;
//! ```

mod builder;
mod error;
#[allow(clippy::module_inception)]
mod processor;

pub use builder::CommandProcessorBuilder;
pub use error::{HandlerFailure, ProcessorError};
pub use processor::CommandProcessor;
