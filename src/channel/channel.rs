use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::debug;

use super::consumer::MessageConsumer;
use super::error::ChannelError;
use crate::message::Message;
use crate::pump::Subscription;

type Buffer = Arc<Mutex<VecDeque<Message>>>;

/// Single-consumer handle over one subscription.
///
/// Wraps a transport [`MessageConsumer`] with a local buffer. The buffer is
/// drained before the transport is asked, which is how [`ChannelHandle::stop`]
/// gets a quit message to a performer blocked elsewhere.
pub struct Channel {
    name: String,
    routing_key: String,
    consumer: Box<dyn MessageConsumer>,
    buffer: Buffer,
}

impl Channel {
    pub fn new(
        name: impl Into<String>,
        routing_key: impl Into<String>,
        consumer: Box<dyn MessageConsumer>,
    ) -> Self {
        Self {
            name: name.into(),
            routing_key: routing_key.into(),
            consumer,
            buffer: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn routing_key(&self) -> &str {
        &self.routing_key
    }

    pub fn receive(&mut self, timeout: Duration) -> Result<Message, ChannelError> {
        let buffered = self
            .buffer
            .lock()
            .map_err(|_| ChannelError::LockPoisoned("receive"))?
            .pop_front();
        match buffered {
            Some(message) => Ok(message),
            None => self.consumer.receive(timeout),
        }
    }

    pub fn acknowledge(&mut self, message: &Message) -> Result<(), ChannelError> {
        self.consumer.acknowledge(message)
    }

    pub fn reject(&mut self, message: &Message) -> Result<(), ChannelError> {
        self.consumer.reject(message)
    }

    /// Requeue, stamping the applied delay on the message header.
    pub fn requeue(&mut self, message: &Message, delay: Option<Duration>) -> Result<bool, ChannelError> {
        let delay = delay.unwrap_or_default();
        let mut message = message.clone();
        message.set_delay(delay);
        self.consumer.requeue(&message, delay)
    }

    /// Drop everything waiting on the transport and in the local buffer.
    pub fn purge(&mut self) -> Result<(), ChannelError> {
        self.buffer
            .lock()
            .map_err(|_| ChannelError::LockPoisoned("purge"))?
            .clear();
        self.consumer.purge()
    }

    /// Put a message in front of the transport.
    pub fn enqueue(&self, message: Message) -> Result<(), ChannelError> {
        self.buffer
            .lock()
            .map_err(|_| ChannelError::LockPoisoned("enqueue"))?
            .push_back(message);
        Ok(())
    }

    pub fn stop(&self) -> Result<(), ChannelError> {
        self.handle().stop()
    }

    /// Handle that can stop this channel from another thread.
    pub fn handle(&self) -> ChannelHandle {
        ChannelHandle {
            name: self.name.clone(),
            buffer: Arc::clone(&self.buffer),
        }
    }
}

#[derive(Clone)]
pub struct ChannelHandle {
    name: String,
    buffer: Buffer,
}

impl ChannelHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Inject the quit message. The performer exits when it receives it,
    /// at the latest one receive timeout later.
    pub fn stop(&self) -> Result<(), ChannelError> {
        debug!(channel = %self.name, "stopping channel");
        self.buffer
            .lock()
            .map_err(|_| ChannelError::LockPoisoned("stop"))?
            .push_back(Message::quit(self.name.clone()));
        Ok(())
    }
}

/// Creates channels for subscriptions, applying the subscription's
/// missing-infrastructure policy.
pub trait ChannelFactory: Send + Sync {
    fn create_channel(&self, subscription: &Subscription) -> Result<Channel, ChannelError>;
}
