use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use courier_rust::{
    Channel, ChannelError, Message, MessageBody, MessageConsumer, MessageHeader, MessageType, MissingInfrastructure,
    Performer, PerformerExit, RequestRoute,
};
use uuid::Uuid;

use crate::support::{run_to_exit, run_until, Harness, PlaceOrder, QUEUE, TOPIC};

/// Transport that hands out a fixed set of messages and cannot requeue.
struct NoRequeue {
    queued: VecDeque<Message>,
    rejected: Arc<Mutex<Vec<Uuid>>>,
}

impl MessageConsumer for NoRequeue {
    fn receive(&mut self, timeout: Duration) -> Result<Message, ChannelError> {
        match self.queued.pop_front() {
            Some(message) => Ok(message),
            None => {
                std::thread::sleep(timeout);
                Ok(Message::none(TOPIC))
            }
        }
    }

    fn acknowledge(&mut self, _: &Message) -> Result<(), ChannelError> {
        Ok(())
    }

    fn reject(&mut self, message: &Message) -> Result<(), ChannelError> {
        self.rejected.lock().unwrap().push(message.id());
        Ok(())
    }

    fn requeue(&mut self, _: &Message, _: Duration) -> Result<bool, ChannelError> {
        Err(ChannelError::failure(QUEUE, "broker refused requeue"))
    }

    fn purge(&mut self) -> Result<(), ChannelError> {
        Ok(())
    }

    fn ensure_infrastructure(&mut self, _: MissingInfrastructure) -> Result<(), ChannelError> {
        Ok(())
    }
}

#[test]
fn handled_message_is_acknowledged() {
    let harness = Harness::new();
    let performer = harness.performer(harness.subscription());
    let id = harness.post("ok");

    let bus = harness.bus.clone();
    let (exit, stats) = run_until(performer, move || bus.acknowledged().len() == 1);

    assert_eq!(exit, PerformerExit::Quit);
    assert_eq!(stats.received, 1);
    assert_eq!(stats.acknowledged, 1);
    assert_eq!(harness.bus.acknowledged()[0].id(), id);
    assert!(harness.bus.dead_letters().is_empty());
}

#[test]
fn deferred_message_is_requeued_until_the_ceiling() {
    let harness = Harness::new();
    let performer = harness.performer(harness.subscription().with_requeue_count(3));
    harness.post("later");

    let bus = harness.bus.clone();
    let (_, stats) = run_until(performer, move || bus.dead_letters().len() == 1);

    assert_eq!(harness.journal.count("later"), 3);
    assert_eq!(stats.requeued, 2);
    assert_eq!(stats.rejected, 1);
    assert_eq!(harness.bus.dead_letters()[0].handled_count(), 3);
    assert_eq!(harness.bus.pending(QUEUE), 0);
}

#[test]
fn transient_failure_is_retried_like_a_deferral() {
    let harness = Harness::new();
    let performer = harness.performer(harness.subscription().with_requeue_count(2));
    harness.post("flaky");

    let bus = harness.bus.clone();
    let (_, stats) = run_until(performer, move || bus.dead_letters().len() == 1);

    assert_eq!(harness.journal.count("flaky"), 2);
    assert_eq!(stats.requeued, 1);
}

#[test]
fn requeue_honours_the_subscription_delay() {
    let harness = Harness::new();
    let performer = harness.performer(
        harness
            .subscription()
            .with_requeue_count(2)
            .with_requeue_delay(Duration::from_millis(100)),
    );
    harness.post("later");

    let started = Instant::now();
    let bus = harness.bus.clone();
    let (exit, stats) = run_until(performer, move || bus.dead_letters().len() == 1);

    assert!(started.elapsed() >= Duration::from_millis(100));
    assert_eq!(exit, PerformerExit::Quit);
    assert_eq!(stats.requeued, 1);
    assert_eq!(harness.journal.count("later"), 2);
}

#[test]
fn rejected_and_failed_messages_are_dead_lettered_once() {
    let harness = Harness::new();
    let performer = harness.performer(harness.subscription());
    harness.post("never");
    harness.post("broken");

    let bus = harness.bus.clone();
    let (_, stats) = run_until(performer, move || bus.dead_letters().len() == 2);

    assert_eq!(harness.journal.count("never"), 1);
    assert_eq!(harness.journal.count("broken"), 1);
    assert_eq!(stats.rejected, 2);
    assert_eq!(stats.requeued, 0);
}

#[test]
fn panicking_handler_does_not_stop_the_performer() {
    let harness = Harness::new();
    let performer = harness.performer(harness.subscription());
    harness.post("panic");
    harness.post("ok");

    let bus = harness.bus.clone();
    let (exit, stats) = run_until(performer, move || bus.acknowledged().len() == 1);

    assert_eq!(exit, PerformerExit::Quit);
    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.acknowledged, 1);
}

#[test]
fn unmappable_messages_count_towards_the_limit() {
    let harness = Harness::new();
    let performer = harness.performer(harness.subscription().with_unacceptable_message_limit(2));
    for _ in 0..2 {
        let garbage = Message::new(
            MessageHeader::new(Uuid::new_v4(), TOPIC, MessageType::Command),
            MessageBody::text("not an order"),
        );
        harness.bus.publish(&garbage).unwrap();
    }
    harness.bus.publish(&Message::unacceptable(Uuid::new_v4(), TOPIC, vec![0xde, 0xad])).unwrap();

    let (exit, stats) = run_to_exit(performer);

    assert_eq!(exit, PerformerExit::UnacceptableLimitReached);
    assert_eq!(stats.rejected, 2);
    // The limit stops the loop before the third one is read.
    assert_eq!(harness.bus.pending(QUEUE), 1);
}

#[test]
fn unacceptable_frames_are_rejected() {
    let harness = Harness::new();
    let performer = harness.performer(harness.subscription());
    harness.bus.publish(&Message::unacceptable(Uuid::new_v4(), TOPIC, vec![1, 2, 3])).unwrap();

    let bus = harness.bus.clone();
    let (exit, stats) = run_until(performer, move || bus.dead_letters().len() == 1);

    assert_eq!(exit, PerformerExit::Quit);
    assert_eq!(stats.received, 0);
    assert_eq!(stats.rejected, 1);
}

#[test]
fn wrong_message_type_stops_the_performer() {
    let harness = Harness::new();
    let performer = harness.performer(harness.subscription());
    let event = Message::new(
        MessageHeader::new(Uuid::new_v4(), TOPIC, MessageType::Event),
        MessageBody::text("{}"),
    );
    harness.bus.publish(&event).unwrap();

    let (exit, _) = run_to_exit(performer);

    assert!(matches!(exit, PerformerExit::ConfigurationError(_)));
    assert_eq!(harness.bus.dead_letters().len(), 1);
}

#[test]
fn failed_requeue_falls_back_to_reject() {
    let harness = Harness::new();
    let order = PlaceOrder::new("later");
    let message = Message::new(
        MessageHeader::new(order.id, TOPIC, MessageType::Command),
        MessageBody::from_json(&order).unwrap(),
    );
    let rejected = Arc::new(Mutex::new(Vec::new()));
    let consumer = NoRequeue {
        queued: VecDeque::from([message]),
        rejected: Arc::clone(&rejected),
    };
    let performer = Performer::new(
        Channel::new(QUEUE, TOPIC, Box::new(consumer)),
        harness.subscription(),
        RequestRoute::command::<PlaceOrder>(),
        Arc::clone(&harness.processor),
    );

    let seen = Arc::clone(&rejected);
    let (exit, stats) = run_until(performer, move || seen.lock().unwrap().len() == 1);

    assert_eq!(exit, PerformerExit::Quit);
    assert_eq!(*rejected.lock().unwrap(), vec![order.id]);
    assert_eq!(stats.requeued, 0);
    assert_eq!(stats.rejected, 1);
    assert_eq!(harness.journal.count("later"), 1);
}
