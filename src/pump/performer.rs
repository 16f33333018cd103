use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, info_span, warn};

use super::route::MessageDispatch;
use super::subscription::Subscription;
use crate::channel::Channel;
use crate::context::{RequestContext, CHANNEL_NAME, REQUEST_START};
use crate::handler::{panic_message, Outcome};
use crate::message::{Message, MessageType};
use crate::processor::{CommandProcessor, ProcessorError};

/// Counters kept by one performer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PerformerStats {
    pub received: u64,
    pub acknowledged: u64,
    pub rejected: u64,
    pub requeued: u64,
}

impl PerformerStats {
    pub fn merge(&mut self, other: &PerformerStats) {
        self.received += other.received;
        self.acknowledged += other.acknowledged;
        self.rejected += other.rejected;
        self.requeued += other.requeued;
    }
}

/// Why a performer left its loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PerformerExit {
    /// The quit message arrived.
    Quit,
    /// Too many unacceptable or unmappable messages.
    UnacceptableLimitReached,
    /// Dispatch hit a wiring mistake. Restarting would hit it again.
    ConfigurationError(String),
}

/// One consumption loop over one channel.
///
/// Receives with the subscription's timeout, maps each message to a request
/// through the route and dispatches it on the performer's own thread. Every
/// message ends acknowledged, requeued or rejected; handler errors and panics
/// never end the loop.
pub struct Performer {
    id: String,
    channel: Channel,
    subscription: Subscription,
    route: Arc<dyn MessageDispatch>,
    processor: Arc<CommandProcessor>,
    stats: PerformerStats,
    unacceptable: u32,
}

impl Performer {
    pub fn new(
        channel: Channel,
        subscription: Subscription,
        route: Arc<dyn MessageDispatch>,
        processor: Arc<CommandProcessor>,
    ) -> Self {
        Self {
            id: format!("{}-0", subscription.name),
            channel,
            subscription,
            route,
            processor,
            stats: PerformerStats::default(),
            unacceptable: 0,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn stats(&self) -> PerformerStats {
        self.stats
    }

    /// Run until quit, the unacceptable limit, or a configuration error.
    pub fn run(&mut self) -> PerformerExit {
        let span = info_span!(
            "courier.performer",
            performer = %self.id,
            channel = %self.channel.name(),
            routing_key = %self.channel.routing_key()
        );
        let _entered = span.enter();
        info!(request = self.route.request_type(), "performer started");

        let exit = loop {
            if self.unacceptable_limit_reached() {
                error!(
                    limit = self.subscription.unacceptable_message_limit,
                    "unacceptable message limit reached, stopping"
                );
                break PerformerExit::UnacceptableLimitReached;
            }

            let message = match self.channel.receive(self.subscription.timeout()) {
                Ok(message) => message,
                Err(err) => {
                    warn!(error = %err, "receive failed, backing off");
                    thread::sleep(self.subscription.channel_failure_delay());
                    continue;
                }
            };

            match message.message_type() {
                MessageType::None => {
                    thread::sleep(self.subscription.empty_channel_delay());
                    continue;
                }
                MessageType::Quit => {
                    debug!("quit received");
                    break PerformerExit::Quit;
                }
                MessageType::Unacceptable => {
                    warn!(message_id = %message.id(), "unacceptable message");
                    self.unacceptable += 1;
                    self.reject(&message);
                    continue;
                }
                _ => {}
            }

            self.stats.received += 1;
            if let Some(exit) = self.handle(message) {
                break exit;
            }
        };

        info!(exit = ?exit, stats = ?self.stats, "performer finished");
        exit
    }

    fn unacceptable_limit_reached(&self) -> bool {
        let limit = self.subscription.unacceptable_message_limit;
        limit > 0 && self.unacceptable >= limit
    }

    fn context_for(&self, message: &Message) -> RequestContext {
        let mut context = RequestContext::new().with_originating_message(message.clone());
        context.insert(CHANNEL_NAME, self.channel.name());
        context.insert(REQUEST_START, Utc::now().to_rfc3339());
        context
    }

    fn handle(&mut self, mut message: Message) -> Option<PerformerExit> {
        let context = self.context_for(&message);
        let route = Arc::clone(&self.route);
        let processor = Arc::clone(&self.processor);
        let dispatched = catch_unwind(AssertUnwindSafe(|| {
            route.dispatch(&processor, &message, context)
        }));

        let result = match dispatched {
            Ok(result) => result,
            Err(panic) => {
                error!(message_id = %message.id(), panic = %panic_message(panic.as_ref()), "handler panicked");
                self.reject(&message);
                return None;
            }
        };

        match result {
            Ok(Outcome::Completed) => self.acknowledge(&message),
            Ok(Outcome::Defer { delay }) => {
                debug!(message_id = %message.id(), "handler deferred message");
                self.defer(&mut message, delay);
            }
            Ok(Outcome::Reject { reason }) => {
                warn!(message_id = %message.id(), reason = %reason, "handler rejected message");
                self.reject(&message);
            }
            Err(err) if err.is_configuration() => {
                error!(message_id = %message.id(), error = %err, "configuration error, stopping performer");
                self.reject(&message);
                return Some(PerformerExit::ConfigurationError(err.to_string()));
            }
            Err(ProcessorError::Mapping(err)) => {
                warn!(message_id = %message.id(), error = %err, "failed to map message");
                self.unacceptable += 1;
                self.reject(&message);
            }
            Err(err) if err.is_transient() => {
                warn!(message_id = %message.id(), error = %err, "transient failure, requeueing");
                self.defer(&mut message, None);
            }
            Err(err) => {
                error!(message_id = %message.id(), error = %err, "failed to dispatch message");
                self.reject(&message);
            }
        }
        None
    }

    /// Requeue below the ceiling, reject at it.
    fn defer(&mut self, message: &mut Message, delay: Option<Duration>) {
        message.update_handled_count();
        if message.handled_count_reached(self.subscription.requeue_count) {
            warn!(
                message_id = %message.id(),
                handled = message.handled_count(),
                "requeue count reached, rejecting"
            );
            self.reject(message);
            return;
        }

        let delay = delay.unwrap_or_else(|| self.subscription.requeue_delay());
        match self.channel.requeue(message, Some(delay)) {
            Ok(true) => self.stats.requeued += 1,
            Ok(false) => {
                warn!(message_id = %message.id(), "channel refused requeue, rejecting");
                self.reject(message);
            }
            Err(err) => {
                error!(message_id = %message.id(), error = %err, "requeue failed, rejecting");
                self.reject(message);
            }
        }
    }

    fn acknowledge(&mut self, message: &Message) {
        match self.channel.acknowledge(message) {
            Ok(()) => self.stats.acknowledged += 1,
            Err(err) => error!(message_id = %message.id(), error = %err, "acknowledge failed"),
        }
    }

    fn reject(&mut self, message: &Message) {
        match self.channel.reject(message) {
            Ok(()) => self.stats.rejected += 1,
            Err(err) => error!(message_id = %message.id(), error = %err, "reject failed"),
        }
    }
}
