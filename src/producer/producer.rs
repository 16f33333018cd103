use std::collections::HashMap;
use std::sync::Arc;

#[cfg(feature = "async")]
use async_trait::async_trait;

use super::error::ProducerError;
use crate::error::ConfigurationError;
use crate::message::Message;

/// Sends messages to an external transport.
///
/// Producers are shared by the command processor, the sweeper and every
/// performer, so sending takes `&self`.
pub trait MessageProducer: Send + Sync {
    fn send(&self, message: &Message) -> Result<(), ProducerError>;
}

#[cfg(feature = "async")]
#[async_trait]
pub trait AsyncMessageProducer: Send + Sync {
    async fn send(&self, message: &Message) -> Result<(), ProducerError>;

    /// Send several messages. Stops at the first failure and reports how many
    /// were sent before it.
    async fn send_batch(&self, messages: &[Message]) -> (usize, Result<(), ProducerError>) {
        for (sent, message) in messages.iter().enumerate() {
            if let Err(err) = self.send(message).await {
                return (sent, Err(err));
            }
        }
        (messages.len(), Ok(()))
    }
}

/// Topic to producer lookup with an optional catch-all.
#[derive(Clone, Default)]
pub struct ProducerRegistry {
    by_topic: HashMap<String, Arc<dyn MessageProducer>>,
    default: Option<Arc<dyn MessageProducer>>,
    #[cfg(feature = "async")]
    async_by_topic: HashMap<String, Arc<dyn AsyncMessageProducer>>,
    #[cfg(feature = "async")]
    async_default: Option<Arc<dyn AsyncMessageProducer>>,
}

impl ProducerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry where every topic goes to `producer`.
    pub fn single(producer: Arc<dyn MessageProducer>) -> Self {
        Self::new().with_default(producer)
    }

    pub fn with_producer(mut self, topic: impl Into<String>, producer: Arc<dyn MessageProducer>) -> Self {
        self.by_topic.insert(topic.into(), producer);
        self
    }

    pub fn with_default(mut self, producer: Arc<dyn MessageProducer>) -> Self {
        self.default = Some(producer);
        self
    }

    pub fn lookup(&self, topic: &str) -> Result<Arc<dyn MessageProducer>, ConfigurationError> {
        self.by_topic
            .get(topic)
            .or(self.default.as_ref())
            .cloned()
            .ok_or_else(|| ConfigurationError::NoProducer(topic.to_string()))
    }

    #[cfg(feature = "async")]
    pub fn with_async_producer(
        mut self,
        topic: impl Into<String>,
        producer: Arc<dyn AsyncMessageProducer>,
    ) -> Self {
        self.async_by_topic.insert(topic.into(), producer);
        self
    }

    #[cfg(feature = "async")]
    pub fn with_async_default(mut self, producer: Arc<dyn AsyncMessageProducer>) -> Self {
        self.async_default = Some(producer);
        self
    }

    #[cfg(feature = "async")]
    pub fn lookup_async(&self, topic: &str) -> Result<Arc<dyn AsyncMessageProducer>, ConfigurationError> {
        self.async_by_topic
            .get(topic)
            .or(self.async_default.as_ref())
            .cloned()
            .ok_or_else(|| ConfigurationError::NoProducer(topic.to_string()))
    }
}
