//! Message pump integration tests.
//!
//! Messages travel processor -> outbox -> in-memory bus -> channel ->
//! performer -> processor, covering:
//! - acknowledge, requeue and reject decisions of a single performer
//! - dispatcher lifecycle, shut/open and performer supervision

mod support;
mod dispatcher;
mod performer;
