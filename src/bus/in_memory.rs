use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Instant;

#[cfg(feature = "async")]
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::channel::ChannelError;
use crate::message::Message;
use crate::producer::{MessageProducer, ProducerError};
#[cfg(feature = "async")]
use crate::producer::AsyncMessageProducer;

pub(super) struct Queue {
    pub(super) routing_key: String,
    pub(super) ready: VecDeque<Message>,
    /// Requeued messages and the instant they become receivable.
    pub(super) delayed: Vec<(Instant, Message)>,
}

impl Queue {
    fn new(routing_key: &str) -> Self {
        Self {
            routing_key: routing_key.to_string(),
            ready: VecDeque::new(),
            delayed: Vec::new(),
        }
    }

    /// Move due requeues to the back of the ready list. Returns the next
    /// instant something else becomes due.
    pub(super) fn promote(&mut self, now: Instant) -> Option<Instant> {
        let (due, waiting): (Vec<_>, Vec<_>) = self.delayed.drain(..).partition(|(at, _)| *at <= now);
        self.delayed = waiting;
        self.ready.extend(due.into_iter().map(|(_, message)| message));
        self.delayed.iter().map(|(at, _)| *at).min()
    }

    fn len(&self) -> usize {
        self.ready.len() + self.delayed.len()
    }
}

#[derive(Default)]
pub(super) struct BusState {
    pub(super) queues: HashMap<String, Queue>,
    pub(super) acknowledged: Vec<Message>,
    pub(super) dead_letters: Vec<Message>,
    pub(super) unrouted: Vec<Message>,
}

#[derive(Default)]
pub(super) struct Shared {
    pub(super) state: Mutex<BusState>,
    pub(super) arrived: Condvar,
}

/// In-process broker for tests and single-process deployments.
///
/// Queues are named after the channel that reads them and bound to one
/// routing key. Sending a message copies it into every queue bound to its
/// topic, so two subscriptions on the same topic each get their own copy,
/// while performers on one subscription compete for the same queue.
///
/// Clones share the broker. Acknowledged, dead-lettered and unrouted
/// messages are kept until drained with the `take_*` methods.
///
/// ## Example
///
/// ```ignore
/// let bus = InMemoryBus::new();
/// bus.declare_queue("billing.orders", "orders")?;
///
/// MessageProducer::send(&bus, &message)?;
/// assert_eq!(bus.pending("billing.orders"), 1);
/// ```
#[derive(Clone, Default)]
pub struct InMemoryBus {
    pub(super) shared: Arc<Shared>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub(super) fn state(&self, action: &'static str) -> Result<MutexGuard<'_, BusState>, ChannelError> {
        self.shared
            .state
            .lock()
            .map_err(|_| ChannelError::LockPoisoned(action))
    }

    /// Create the queue if it does not exist yet.
    pub fn declare_queue(&self, channel: &str, routing_key: &str) -> Result<(), ChannelError> {
        let mut state = self.state("declare")?;
        state.queues.entry(channel.to_string()).or_insert_with(|| {
            debug!(channel, routing_key, "queue declared");
            Queue::new(routing_key)
        });
        Ok(())
    }

    pub fn queue_exists(&self, channel: &str) -> bool {
        self.state("exists")
            .map(|state| state.queues.contains_key(channel))
            .unwrap_or(false)
    }

    /// Copy the message into every queue bound to its topic. Returns how
    /// many queues took it.
    pub fn publish(&self, message: &Message) -> Result<usize, ChannelError> {
        let mut state = self.state("publish")?;
        let mut delivered = 0;
        for queue in state.queues.values_mut() {
            if queue.routing_key == message.topic() {
                queue.ready.push_back(message.clone());
                delivered += 1;
            }
        }
        if delivered == 0 {
            warn!(message_id = %message.id(), topic = %message.topic(), "no queue bound, message unrouted");
            state.unrouted.push(message.clone());
        }
        drop(state);
        self.shared.arrived.notify_all();
        Ok(delivered)
    }

    /// Messages waiting in a queue, delayed requeues included.
    pub fn pending(&self, channel: &str) -> usize {
        self.state("pending")
            .ok()
            .and_then(|state| state.queues.get(channel).map(Queue::len))
            .unwrap_or(0)
    }

    pub fn acknowledged(&self) -> Vec<Message> {
        self.state("acknowledged")
            .map(|state| state.acknowledged.clone())
            .unwrap_or_default()
    }

    pub fn dead_letters(&self) -> Vec<Message> {
        self.state("dead letters")
            .map(|state| state.dead_letters.clone())
            .unwrap_or_default()
    }

    pub fn unrouted(&self) -> Vec<Message> {
        self.state("unrouted")
            .map(|state| state.unrouted.clone())
            .unwrap_or_default()
    }

    /// Remove and return the acknowledged log. The logs only grow, so a
    /// long-lived bus should drain them periodically.
    pub fn take_acknowledged(&self) -> Vec<Message> {
        self.state("take acknowledged")
            .map(|mut state| std::mem::take(&mut state.acknowledged))
            .unwrap_or_default()
    }

    pub fn take_dead_letters(&self) -> Vec<Message> {
        self.state("take dead letters")
            .map(|mut state| std::mem::take(&mut state.dead_letters))
            .unwrap_or_default()
    }

    pub fn take_unrouted(&self) -> Vec<Message> {
        self.state("take unrouted")
            .map(|mut state| std::mem::take(&mut state.unrouted))
            .unwrap_or_default()
    }
}

impl MessageProducer for InMemoryBus {
    fn send(&self, message: &Message) -> Result<(), ProducerError> {
        self.publish(message)
            .map(|_| ())
            .map_err(|err| ProducerError::ConnectionFailed(err.to_string()))
    }
}

#[cfg(feature = "async")]
#[async_trait]
impl AsyncMessageProducer for InMemoryBus {
    async fn send(&self, message: &Message) -> Result<(), ProducerError> {
        MessageProducer::send(self, message)
    }
}
