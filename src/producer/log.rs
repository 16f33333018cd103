use std::sync::{Arc, Mutex};

use tracing::info;

#[cfg(feature = "async")]
use async_trait::async_trait;

use super::error::ProducerError;
use super::producer::MessageProducer;
#[cfg(feature = "async")]
use super::producer::AsyncMessageProducer;
use crate::message::Message;

/// A producer that writes each message to the log, or into a buffer.
#[derive(Clone, Default)]
pub struct LogProducer {
    buffer: Option<Arc<Mutex<Vec<String>>>>,
}

impl LogProducer {
    pub fn new() -> Self {
        LogProducer { buffer: None }
    }

    pub fn with_buffer(buffer: Arc<Mutex<Vec<String>>>) -> Self {
        LogProducer {
            buffer: Some(buffer),
        }
    }

    fn write(&self, message: &Message) -> Result<(), ProducerError> {
        let header = &message.header;
        let bag = if header.bag.is_empty() {
            String::new()
        } else {
            format!(" bag={:?}", header.bag)
        };
        let line = format!(
            "[{:?}] {} {} {}{}",
            header.message_type,
            header.topic,
            header.id,
            message.body.display(),
            bag
        );
        match &self.buffer {
            Some(buffer) => buffer
                .lock()
                .map_err(|_| ProducerError::LockPoisoned("log buffer"))?
                .push(line),
            None => info!(
                topic = %header.topic,
                message_id = %header.id,
                "{}",
                line
            ),
        }
        Ok(())
    }
}

impl MessageProducer for LogProducer {
    fn send(&self, message: &Message) -> Result<(), ProducerError> {
        self.write(message)
    }
}

#[cfg(feature = "async")]
#[async_trait]
impl AsyncMessageProducer for LogProducer {
    async fn send(&self, message: &Message) -> Result<(), ProducerError> {
        self.write(message)
    }
}
