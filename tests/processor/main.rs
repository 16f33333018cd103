//! Command processor integration tests.
//!
//! - `send` resolves exactly one handler per command
//! - `publish` runs every handler and aggregates failures
//! - deposit and clear move messages through the in-memory outbox
//! - the async surface mirrors all of the above

mod support;
mod asynchronous;
mod publish;
