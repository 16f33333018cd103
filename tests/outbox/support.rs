use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use courier_rust::{
    InMemoryOutbox, LogProducer, Message, MessageBody, MessageHeader, MessageType, OutboxProducerMediator,
    ProducerRegistry,
};
use uuid::Uuid;

pub fn message(topic: &str, text: &str) -> Message {
    Message::new(
        MessageHeader::new(Uuid::new_v4(), topic, MessageType::Event),
        MessageBody::text(text),
    )
}

pub struct Fixture {
    pub outbox: InMemoryOutbox,
    pub sent: Arc<Mutex<Vec<String>>>,
    pub mediator: Arc<OutboxProducerMediator>,
}

impl Fixture {
    pub fn new() -> Self {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let producer = Arc::new(LogProducer::with_buffer(Arc::clone(&sent)));
        Self::with_producers(sent, ProducerRegistry::single(producer))
    }

    /// No producer for any topic: every send fails.
    pub fn without_producers() -> Self {
        Self::with_producers(Arc::new(Mutex::new(Vec::new())), ProducerRegistry::new())
    }

    fn with_producers(sent: Arc<Mutex<Vec<String>>>, producers: ProducerRegistry) -> Self {
        let outbox = InMemoryOutbox::new();
        let mediator = OutboxProducerMediator::new(Arc::new(outbox.clone()), producers);
        Self {
            outbox,
            sent,
            mediator: Arc::new(mediator),
        }
    }

    /// Deposit outside any transaction, without clearing.
    pub fn deposit(&self, count: usize) -> Vec<Uuid> {
        (0..count)
            .map(|n| {
                let message = message("orders", &format!("order {n}"));
                self.mediator.deposit(&message, None).unwrap();
                message.id()
            })
            .collect()
    }

    pub fn sent(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn wait_for_sent(&self, expected: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.sent() >= expected {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        self.sent() >= expected
    }
}
