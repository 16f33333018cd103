use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use courier_rust::{
    Channel, ChannelError, ChannelFactory, Command, CommandProcessor, HandlerError, HandlerRegistration,
    HandlerRegistry, HandlerResult, InMemoryBus, InMemoryConsumer, InMemoryOutbox, Message, MessageConsumer,
    MessageMapperRegistry, MissingInfrastructure, Outcome, OutboxProducerMediator, Performer, PerformerExit,
    PerformerStats, ProducerRegistry, Publication, Request, RequestContext, RequestRoute, Subscription,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const TOPIC: &str = "orders";
pub const QUEUE: &str = "orders.q";

/// The handler's behaviour is picked by the sku:
/// `ok`, `later` (defer), `never` (reject), `flaky` (transient error),
/// `broken` (permanent error), `slow` (1.5 s before completing) and `panic`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub id: Uuid,
    pub sku: String,
}

impl PlaceOrder {
    pub fn new(sku: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            sku: sku.to_string(),
        }
    }
}

impl Request for PlaceOrder {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Command for PlaceOrder {}

#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|e| e.as_str() == entry).count()
    }
}

fn handle(order: &PlaceOrder) -> HandlerResult {
    match order.sku.as_str() {
        "later" => Ok(Outcome::defer()),
        "never" => Ok(Outcome::reject("discontinued")),
        "flaky" => Err(HandlerError::Transient("warehouse busy".into())),
        "broken" => Err(HandlerError::Failed("warehouse gone".into())),
        "slow" => {
            thread::sleep(Duration::from_millis(1500));
            Ok(Outcome::Completed)
        }
        "panic" => panic!("handler blew up on {}", order.id),
        _ => Ok(Outcome::Completed),
    }
}

/// A bus, plus a processor that handles `PlaceOrder` and posts onto the bus.
pub struct Harness {
    pub bus: InMemoryBus,
    pub journal: Journal,
    pub processor: Arc<CommandProcessor>,
}

impl Harness {
    pub fn new() -> Self {
        let bus = InMemoryBus::new();
        let journal = Journal::default();

        let seen = journal.clone();
        let mut handlers = HandlerRegistry::new();
        handlers.add(HandlerRegistration::new("PlaceOrderHandler", move || {
            let seen = seen.clone();
            move |order: &mut PlaceOrder, _: &mut RequestContext| -> HandlerResult {
                seen.push(order.sku.clone());
                handle(order)
            }
        }));

        let mut mappers = MessageMapperRegistry::new();
        mappers.register_json::<PlaceOrder>(Publication::command(TOPIC));

        let mediator = OutboxProducerMediator::new(
            Arc::new(InMemoryOutbox::new()),
            ProducerRegistry::single(Arc::new(bus.clone())),
        );

        let processor = CommandProcessor::builder()
            .handlers(handlers)
            .mappers(mappers)
            .outbox(Arc::new(mediator))
            .build();

        Self {
            bus,
            journal,
            processor: Arc::new(processor),
        }
    }

    /// Post an order through the outbox onto the bus.
    pub fn post(&self, sku: &str) -> Uuid {
        let order = PlaceOrder::new(sku);
        let report = self.processor.post(&order).unwrap();
        assert_eq!(report.sent, 1);
        order.id
    }

    pub fn subscription(&self) -> Subscription {
        Subscription::new("orders", QUEUE, TOPIC)
            .with_timeout(Duration::from_millis(20))
            .with_empty_channel_delay(Duration::from_millis(1))
            .with_requeue_count(3)
    }

    pub fn performer(&self, subscription: Subscription) -> Performer {
        self.bus.declare_queue(QUEUE, TOPIC).unwrap();
        let consumer = InMemoryConsumer::new(self.bus.clone(), QUEUE, TOPIC);
        let channel = Channel::new(QUEUE, TOPIC, Box::new(consumer));
        Performer::new(
            channel,
            subscription,
            RequestRoute::command::<PlaceOrder>(),
            Arc::clone(&self.processor),
        )
    }
}

pub fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Run a performer on its own thread until `done`, then stop its channel.
pub fn run_until(performer: Performer, done: impl Fn() -> bool) -> (PerformerExit, PerformerStats) {
    let handle = performer.channel().handle();
    let worker = thread::spawn(move || {
        let mut performer = performer;
        let exit = performer.run();
        (exit, performer.stats())
    });
    assert!(wait_until(Duration::from_secs(5), done), "performer did not reach the expected state");
    handle.stop().unwrap();
    worker.join().unwrap()
}

/// Run a performer that is expected to stop by itself.
pub fn run_to_exit(performer: Performer) -> (PerformerExit, PerformerStats) {
    let worker = thread::spawn(move || {
        let mut performer = performer;
        let exit = performer.run();
        (exit, performer.stats())
    });
    worker.join().unwrap()
}

/// Transport whose receive panics, killing the performer thread.
struct Exploding;

impl MessageConsumer for Exploding {
    fn receive(&mut self, _: Duration) -> Result<Message, ChannelError> {
        thread::sleep(Duration::from_millis(5));
        panic!("transport driver crashed")
    }

    fn acknowledge(&mut self, _: &Message) -> Result<(), ChannelError> {
        Ok(())
    }

    fn reject(&mut self, _: &Message) -> Result<(), ChannelError> {
        Ok(())
    }

    fn requeue(&mut self, _: &Message, _: Duration) -> Result<bool, ChannelError> {
        Ok(false)
    }

    fn purge(&mut self) -> Result<(), ChannelError> {
        Ok(())
    }

    fn ensure_infrastructure(&mut self, _: MissingInfrastructure) -> Result<(), ChannelError> {
        Ok(())
    }
}

pub struct ExplodingFactory;

impl ChannelFactory for ExplodingFactory {
    fn create_channel(&self, subscription: &Subscription) -> Result<Channel, ChannelError> {
        Ok(Channel::new(
            &subscription.channel_name,
            &subscription.routing_key,
            Box::new(Exploding),
        ))
    }
}
