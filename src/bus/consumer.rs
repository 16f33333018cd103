use std::time::{Duration, Instant};

use tracing::debug;

use super::in_memory::InMemoryBus;
use crate::channel::{Channel, ChannelError, ChannelFactory, MessageConsumer};
use crate::message::Message;
use crate::pump::{MissingInfrastructure, Subscription};

/// Consumer for one queue of an [`InMemoryBus`].
pub struct InMemoryConsumer {
    bus: InMemoryBus,
    channel: String,
    routing_key: String,
}

impl InMemoryConsumer {
    pub fn new(bus: InMemoryBus, channel: impl Into<String>, routing_key: impl Into<String>) -> Self {
        Self {
            bus,
            channel: channel.into(),
            routing_key: routing_key.into(),
        }
    }

    fn missing(&self) -> ChannelError {
        ChannelError::failure(&self.channel, "queue does not exist")
    }
}

impl MessageConsumer for InMemoryConsumer {
    fn receive(&mut self, timeout: Duration) -> Result<Message, ChannelError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.bus.state("receive")?;
        loop {
            let now = Instant::now();
            let queue = state.queues.get_mut(&self.channel).ok_or_else(|| self.missing())?;
            let next_due = queue.promote(now);
            if let Some(message) = queue.ready.pop_front() {
                return Ok(message);
            }
            if now >= deadline {
                return Ok(Message::none(self.channel.clone()));
            }

            let wait = next_due.map_or(deadline, |due| due.min(deadline)) - now;
            let (guard, _) = self
                .bus
                .shared
                .arrived
                .wait_timeout(state, wait)
                .map_err(|_| ChannelError::LockPoisoned("receive"))?;
            state = guard;
        }
    }

    fn acknowledge(&mut self, message: &Message) -> Result<(), ChannelError> {
        self.bus.state("acknowledge")?.acknowledged.push(message.clone());
        Ok(())
    }

    fn reject(&mut self, message: &Message) -> Result<(), ChannelError> {
        debug!(channel = %self.channel, message_id = %message.id(), "dead lettered");
        self.bus.state("reject")?.dead_letters.push(message.clone());
        Ok(())
    }

    fn requeue(&mut self, message: &Message, delay: Duration) -> Result<bool, ChannelError> {
        let mut state = self.bus.state("requeue")?;
        let Some(queue) = state.queues.get_mut(&self.channel) else {
            return Ok(false);
        };
        if delay.is_zero() {
            queue.ready.push_back(message.clone());
        } else {
            queue.delayed.push((Instant::now() + delay, message.clone()));
        }
        drop(state);
        self.bus.shared.arrived.notify_all();
        Ok(true)
    }

    fn purge(&mut self) -> Result<(), ChannelError> {
        let mut state = self.bus.state("purge")?;
        if let Some(queue) = state.queues.get_mut(&self.channel) {
            queue.ready.clear();
            queue.delayed.clear();
        }
        Ok(())
    }

    fn ensure_infrastructure(&mut self, policy: MissingInfrastructure) -> Result<(), ChannelError> {
        match policy {
            MissingInfrastructure::Create => self.bus.declare_queue(&self.channel, &self.routing_key),
            MissingInfrastructure::Validate if !self.bus.queue_exists(&self.channel) => {
                Err(ChannelError::MissingInfrastructure {
                    channel: self.channel.clone(),
                })
            }
            MissingInfrastructure::Validate | MissingInfrastructure::Assume => Ok(()),
        }
    }
}

/// Channel factory over an [`InMemoryBus`].
#[derive(Clone, Default)]
pub struct InMemoryChannelFactory {
    bus: InMemoryBus,
}

impl InMemoryChannelFactory {
    pub fn new(bus: InMemoryBus) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &InMemoryBus {
        &self.bus
    }
}

impl ChannelFactory for InMemoryChannelFactory {
    fn create_channel(&self, subscription: &Subscription) -> Result<Channel, ChannelError> {
        let mut consumer = InMemoryConsumer::new(
            self.bus.clone(),
            &subscription.channel_name,
            &subscription.routing_key,
        );
        consumer.ensure_infrastructure(subscription.make_channels)?;
        Ok(Channel::new(
            &subscription.channel_name,
            &subscription.routing_key,
            Box::new(consumer),
        ))
    }
}
