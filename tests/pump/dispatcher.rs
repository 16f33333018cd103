use std::sync::Arc;
use std::time::{Duration, Instant};

use courier_rust::{
    ChannelError, Dispatcher, DispatcherConfig, DispatcherError, DispatcherState, InMemoryChannelFactory, Message,
    MissingInfrastructure, RequestRoute,
};
use uuid::Uuid;

use crate::support::{wait_until, ExplodingFactory, Harness, PlaceOrder, QUEUE, TOPIC};

fn dispatcher(harness: &Harness, subscription: courier_rust::Subscription) -> Dispatcher {
    Dispatcher::builder()
        .processor(Arc::clone(&harness.processor))
        .channel_factory(Arc::new(InMemoryChannelFactory::new(harness.bus.clone())))
        .subscription(subscription, RequestRoute::command::<PlaceOrder>())
        .config(DispatcherConfig {
            end_timeout_ms: 2000,
            ..DispatcherConfig::default()
        })
        .build()
        .unwrap()
}

fn performers(dispatcher: &Dispatcher) -> usize {
    dispatcher.status().iter().map(|status| status.performers).sum()
}

#[test]
fn receive_then_end_drains_and_stops() {
    let harness = Harness::new();
    let dispatcher = dispatcher(&harness, harness.subscription().with_performers(2));
    assert_eq!(dispatcher.state(), DispatcherState::Awaiting);

    dispatcher.receive().unwrap();
    assert_eq!(dispatcher.state(), DispatcherState::Running);
    assert_eq!(performers(&dispatcher), 2);

    for _ in 0..4 {
        harness.post("ok");
    }
    let bus = harness.bus.clone();
    assert!(wait_until(Duration::from_secs(5), || bus.acknowledged().len() == 4));

    dispatcher.end().unwrap();
    assert_eq!(dispatcher.state(), DispatcherState::Stopped);
    assert_eq!(performers(&dispatcher), 0);
    assert_eq!(harness.journal.count("ok"), 4);
}

#[test]
fn receive_is_only_allowed_once() {
    let harness = Harness::new();
    let dispatcher = dispatcher(&harness, harness.subscription());
    dispatcher.receive().unwrap();

    let err = dispatcher.receive().unwrap_err();

    assert!(matches!(
        err,
        DispatcherError::InvalidState {
            state: DispatcherState::Running,
            expected: DispatcherState::Awaiting
        }
    ));
    dispatcher.end().unwrap();
}

#[test]
fn end_before_receive_is_a_no_op() {
    let harness = Harness::new();
    let dispatcher = dispatcher(&harness, harness.subscription());

    dispatcher.end().unwrap();

    assert_eq!(dispatcher.state(), DispatcherState::Awaiting);
}

#[test]
fn missing_queue_fails_receive_when_validating() {
    let harness = Harness::new();
    let dispatcher = dispatcher(
        &harness,
        harness.subscription().with_make_channels(MissingInfrastructure::Validate),
    );

    let err = dispatcher.receive().unwrap_err();

    assert!(matches!(
        err,
        DispatcherError::Channel(ChannelError::MissingInfrastructure { .. })
    ));
    assert_eq!(dispatcher.state(), DispatcherState::Awaiting);
    assert!(!harness.bus.queue_exists(QUEUE));
}

#[test]
fn shut_subscription_leaves_messages_waiting_until_opened() {
    let harness = Harness::new();
    let dispatcher = dispatcher(&harness, harness.subscription());
    dispatcher.receive().unwrap();

    dispatcher.shut("orders").unwrap();
    assert_eq!(performers(&dispatcher), 0);

    harness.post("ok");
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(harness.bus.pending(QUEUE), 1);

    dispatcher.open("orders").unwrap();
    let bus = harness.bus.clone();
    assert!(wait_until(Duration::from_secs(5), || bus.acknowledged().len() == 1));
    assert_eq!(performers(&dispatcher), 1);

    dispatcher.end().unwrap();
}

#[test]
fn unknown_subscription_is_reported() {
    let harness = Harness::new();
    let dispatcher = dispatcher(&harness, harness.subscription());
    dispatcher.receive().unwrap();

    assert!(matches!(
        dispatcher.shut("payments"),
        Err(DispatcherError::UnknownSubscription(ref name)) if name == "payments"
    ));
    assert!(matches!(
        dispatcher.open("payments"),
        Err(DispatcherError::UnknownSubscription(_))
    ));
    dispatcher.end().unwrap();
}

#[test]
fn unacceptable_limit_marks_the_subscription_unhealthy() {
    let harness = Harness::new();
    let dispatcher = dispatcher(&harness, harness.subscription().with_unacceptable_message_limit(1));
    dispatcher.receive().unwrap();

    harness
        .bus
        .publish(&Message::unacceptable(Uuid::new_v4(), TOPIC, b"%%".to_vec()))
        .unwrap();
    assert!(wait_until(Duration::from_secs(5), || dispatcher.status()[0].unhealthy));
    assert!(wait_until(Duration::from_secs(5), || performers(&dispatcher) == 0));

    dispatcher.open("orders").unwrap();
    let status = &dispatcher.status()[0];
    assert!(!status.unhealthy);
    assert_eq!(status.performers, 1);

    dispatcher.end().unwrap();
}

#[test]
fn dead_performers_are_restarted_within_the_budget() {
    let harness = Harness::new();
    let dispatcher = Dispatcher::builder()
        .processor(Arc::clone(&harness.processor))
        .channel_factory(Arc::new(ExplodingFactory))
        .subscription(harness.subscription(), RequestRoute::command::<PlaceOrder>())
        .config(DispatcherConfig {
            end_timeout_ms: 1000,
            death_budget: 2,
        })
        .build()
        .unwrap();
    dispatcher.receive().unwrap();

    assert!(wait_until(Duration::from_secs(5), || dispatcher.status()[0].unhealthy));
    assert!(wait_until(Duration::from_secs(5), || performers(&dispatcher) == 0));

    assert_eq!(dispatcher.status()[0].deaths, 2);
    dispatcher.end().unwrap();
    assert_eq!(dispatcher.state(), DispatcherState::Stopped);
}

#[test]
fn end_abandons_a_busy_performer_after_the_timeout() {
    let harness = Harness::new();
    let dispatcher = Dispatcher::builder()
        .processor(Arc::clone(&harness.processor))
        .channel_factory(Arc::new(InMemoryChannelFactory::new(harness.bus.clone())))
        .subscription(harness.subscription(), RequestRoute::command::<PlaceOrder>())
        .config(DispatcherConfig {
            end_timeout_ms: 100,
            ..DispatcherConfig::default()
        })
        .build()
        .unwrap();
    dispatcher.receive().unwrap();

    harness.post("slow");
    let journal = harness.journal.clone();
    assert!(wait_until(Duration::from_secs(5), || journal.count("slow") == 1));

    let started = Instant::now();
    dispatcher.end().unwrap();

    assert!(started.elapsed() < Duration::from_millis(1000));
    assert_eq!(dispatcher.state(), DispatcherState::Stopped);
}

#[test]
fn builder_rejects_incomplete_wiring() {
    let harness = Harness::new();

    let no_factory = Dispatcher::builder()
        .processor(Arc::clone(&harness.processor))
        .subscription(harness.subscription(), RequestRoute::command::<PlaceOrder>())
        .build();
    assert!(matches!(no_factory, Err(DispatcherError::Configuration(_))));

    let no_route = Dispatcher::builder()
        .processor(Arc::clone(&harness.processor))
        .channel_factory(Arc::new(InMemoryChannelFactory::new(harness.bus.clone())))
        .subscriptions(vec![harness.subscription()])
        .build();
    assert!(matches!(no_route, Err(DispatcherError::Configuration(_))));

    let duplicate = Dispatcher::builder()
        .processor(Arc::clone(&harness.processor))
        .channel_factory(Arc::new(InMemoryChannelFactory::new(harness.bus.clone())))
        .subscriptions(vec![harness.subscription(), harness.subscription()])
        .route("orders", RequestRoute::command::<PlaceOrder>())
        .build();
    assert!(matches!(duplicate, Err(DispatcherError::Configuration(_))));
}
