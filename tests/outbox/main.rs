//! Outbox recovery tests: the sweeper, its lock and its background thread.

mod support;

use std::sync::Arc;
use std::time::Duration;

use courier_rust::outbox::SWEEPER_LOCK;
use courier_rust::{
    DistributedLock, InMemoryDistributedLock, Outbox, OutboxSweeper, SweeperConfig, SweeperThread,
};

use support::Fixture;

fn eager(batch_size: usize) -> SweeperConfig {
    SweeperConfig::new(Duration::from_millis(10), Duration::ZERO, batch_size)
}

#[test]
fn sweep_sends_outstanding_messages_once() {
    let fixture = Fixture::new();
    let ids = fixture.deposit(2);
    let sweeper = OutboxSweeper::new(fixture.mediator.clone(), eager(100));

    let first = sweeper.sweep();
    assert_eq!(first.passes, 1);
    assert_eq!(first.candidates, 2);
    assert_eq!(first.cleared.sent, 2);

    let second = sweeper.sweep();
    assert_eq!(second.candidates, 0);
    assert_eq!(fixture.sent(), 2);
    for id in ids {
        assert!(Outbox::get(&fixture.outbox, id).unwrap().unwrap().is_dispatched());
    }
}

#[test]
fn young_messages_are_left_for_the_explicit_clear() {
    let fixture = Fixture::new();
    fixture.deposit(1);
    let sweeper = OutboxSweeper::new(
        fixture.mediator.clone(),
        SweeperConfig::new(Duration::from_secs(1), Duration::from_secs(60), 100),
    );

    let stats = sweeper.sweep();

    assert_eq!(stats.candidates, 0);
    assert_eq!(fixture.sent(), 0);
}

#[test]
fn batch_size_caps_one_pass() {
    let fixture = Fixture::new();
    fixture.deposit(3);
    let sweeper = OutboxSweeper::new(fixture.mediator.clone(), eager(2));

    assert_eq!(sweeper.sweep().cleared.sent, 2);
    assert_eq!(sweeper.sweep().cleared.sent, 1);
    assert_eq!(Outbox::outstanding_count(&fixture.outbox).unwrap(), 0);
}

#[test]
fn explicitly_cleared_messages_are_not_swept_again() {
    let fixture = Fixture::new();
    let ids = fixture.deposit(2);
    fixture.mediator.clear(&ids[..1]);
    let sweeper = OutboxSweeper::new(fixture.mediator.clone(), eager(100));

    let stats = sweeper.sweep();

    assert_eq!(stats.candidates, 1);
    assert_eq!(fixture.sent(), 2);
}

#[test]
fn failed_sends_stay_outstanding() {
    let fixture = Fixture::without_producers();
    fixture.deposit(1);
    let sweeper = OutboxSweeper::new(fixture.mediator.clone(), eager(100));

    let stats = sweeper.sweep();

    assert_eq!(stats.cleared.failed, 1);
    assert_eq!(Outbox::outstanding_count(&fixture.outbox).unwrap(), 1);
}

#[test]
fn contended_lock_skips_the_pass() {
    let fixture = Fixture::new();
    fixture.deposit(1);
    let lock = Arc::new(InMemoryDistributedLock::new());
    let sweeper = OutboxSweeper::new(fixture.mediator.clone(), eager(100)).with_lock(lock.clone());

    let held = lock.obtain_lock(SWEEPER_LOCK).unwrap().unwrap();
    let skipped = sweeper.sweep();
    assert_eq!(skipped.lock_contended, 1);
    assert_eq!(fixture.sent(), 0);

    lock.release_lock(SWEEPER_LOCK, &held).unwrap();
    let swept = sweeper.sweep();
    assert_eq!(swept.cleared.sent, 1);
    assert!(!lock.is_locked(SWEEPER_LOCK));
}

#[test]
fn sweeper_thread_clears_in_the_background() {
    let fixture = Fixture::new();
    let thread = SweeperThread::spawn(OutboxSweeper::new(fixture.mediator.clone(), eager(100)));

    fixture.deposit(3);
    assert!(fixture.wait_for_sent(3, Duration::from_secs(2)));

    let stats = thread.stop();
    assert!(stats.passes >= 1);
    assert_eq!(stats.cleared.sent, 3);
    assert_eq!(fixture.sent(), 3);
}
