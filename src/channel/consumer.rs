use std::time::Duration;

use super::error::ChannelError;
use crate::message::Message;
use crate::pump::MissingInfrastructure;

/// Transport side of a channel: one subscription on one broker.
///
/// Implemented once per transport. A consumer is owned by exactly one
/// channel and is only ever driven from its performer's thread.
pub trait MessageConsumer: Send {
    /// Wait up to `timeout` for a message. Returns [`Message::none`] when
    /// nothing arrived; never blocks past the timeout.
    fn receive(&mut self, timeout: Duration) -> Result<Message, ChannelError>;

    fn acknowledge(&mut self, message: &Message) -> Result<(), ChannelError>;

    /// Give up on a message. Transports with a dead letter queue move it there.
    fn reject(&mut self, message: &Message) -> Result<(), ChannelError>;

    /// Put a message back for redelivery after `delay`. Returns false if the
    /// transport could not take it back.
    fn requeue(&mut self, message: &Message, delay: Duration) -> Result<bool, ChannelError>;

    fn purge(&mut self) -> Result<(), ChannelError>;

    fn ensure_infrastructure(&mut self, _policy: MissingInfrastructure) -> Result<(), ChannelError> {
        Ok(())
    }
}
