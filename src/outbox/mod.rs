//! Transactional outbox.
//!
//! The outbox pattern has two phases:
//! 1. **Deposit** - the message is written to the outbox inside the caller's
//!    transaction, so it exists if and only if the business change committed.
//! 2. **Clear** - after commit the message is sent and marked dispatched. The
//!    sweeper repeats this for anything a crash left behind.
//!
//! ## Example
//!
//! ```ignore
//! let tx = outbox.begin();
//! let id = processor.deposit_post(&order_placed, Some(&tx))?;
//! tx.commit()?;
//! processor.clear_outbox(&[id])?;
//! ```

mod error;
mod in_memory;
mod mediator;
#[allow(clippy::module_inception)]
mod outbox;
mod sweeper;
mod thread;

pub use error::OutboxError;
pub use in_memory::{InMemoryOutbox, InMemoryTransaction};
pub use mediator::{ClearReport, OutboxLimits, OutboxProducerMediator};
pub use outbox::{Outbox, OutboxEntry, Transaction};
#[cfg(feature = "async")]
pub use outbox::AsyncOutbox;
pub use sweeper::{OutboxSweeper, SweepStats, SweeperConfig, SWEEPER_LOCK};
pub use thread::SweeperThread;
