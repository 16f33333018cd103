//! Distributed lock abstraction.
//!
//! The sweeper takes the `outbox-sweeper` lock before each pass when several
//! processes share one outbox. [`InMemoryDistributedLock`] serves tests and
//! single-process deployments.

mod error;
mod in_memory;
#[allow(clippy::module_inception)]
mod lock;

pub use error::LockError;
pub use in_memory::InMemoryDistributedLock;
pub use lock::DistributedLock;
