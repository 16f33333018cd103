use std::sync::{Arc, Mutex};

use courier_rust::outbox::OutboxLimits;
use courier_rust::{
    Command, Event, InMemoryOutbox, LogProducer, MessageMapperRegistry, OutboxProducerMediator, ProducerRegistry,
    Publication, Request,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub id: Uuid,
    pub sku: String,
    pub quantity: u32,
}

impl PlaceOrder {
    pub fn new(sku: &str, quantity: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            sku: sku.to_string(),
            quantity,
        }
    }
}

impl Request for PlaceOrder {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Command for PlaceOrder {}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub id: Uuid,
    pub order_id: Uuid,
}

impl OrderPlaced {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
        }
    }
}

impl Request for OrderPlaced {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Event for OrderPlaced {}

#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

pub fn mappers() -> MessageMapperRegistry {
    let mut mappers = MessageMapperRegistry::new();
    mappers
        .register_json::<PlaceOrder>(Publication::command("orders"))
        .register_json::<OrderPlaced>(Publication::event("order.placed"));
    mappers
}

/// In-memory outbox whose producer writes one line per sent message.
pub struct OutboxFixture {
    pub outbox: InMemoryOutbox,
    pub sent: Arc<Mutex<Vec<String>>>,
    pub mediator: Arc<OutboxProducerMediator>,
}

impl OutboxFixture {
    pub fn new() -> Self {
        Self::with_limits(OutboxLimits::default())
    }

    pub fn with_limits(limits: OutboxLimits) -> Self {
        let outbox = InMemoryOutbox::new();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let producer = Arc::new(LogProducer::with_buffer(Arc::clone(&sent)));
        let producers = ProducerRegistry::single(producer.clone()).with_async_default(producer);
        let mediator = OutboxProducerMediator::in_memory(outbox.clone(), producers).with_limits(limits);
        Self {
            outbox,
            sent,
            mediator: Arc::new(mediator),
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}
