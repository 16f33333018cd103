use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use courier_rust::steps::{Retry, Timeout};
use courier_rust::{
    CommandProcessor, HandlerError, HandlerRegistration, HandlerRegistry, HandlerResult, Outcome, PolicyRegistry,
    ProcessorError, RequestContext, RetryPolicy, StepDescriptor,
};

use crate::support::{Journal, OrderPlaced};

type Behaviour = fn(&mut RequestContext) -> HandlerResult;

fn subscriber(name: &'static str, journal: &Journal, behaviour: Behaviour) -> HandlerRegistration<OrderPlaced> {
    let journal = journal.clone();
    HandlerRegistration::new(name, move || {
        let journal = journal.clone();
        move |_: &mut OrderPlaced, context: &mut RequestContext| -> HandlerResult {
            journal.push(name);
            behaviour(context)
        }
    })
}

fn complete(_: &mut RequestContext) -> HandlerResult {
    Ok(Outcome::Completed)
}

fn fail(_: &mut RequestContext) -> HandlerResult {
    Err(HandlerError::Failed("mailer down".into()))
}

fn transient(_: &mut RequestContext) -> HandlerResult {
    Err(HandlerError::Transient("mailer busy".into()))
}

fn processor(registrations: Vec<HandlerRegistration<OrderPlaced>>) -> CommandProcessor {
    let mut handlers = HandlerRegistry::new();
    for registration in registrations {
        handlers.add(registration);
    }
    CommandProcessor::builder().handlers(handlers).build()
}

#[test]
fn event_without_subscribers_completes() {
    let processor = CommandProcessor::builder().build();

    assert_eq!(processor.publish(&mut OrderPlaced::new()).unwrap(), Outcome::Completed);
}

#[test]
fn every_subscriber_runs_in_registration_order() {
    let journal = Journal::default();
    let processor = processor(vec![
        subscriber("Billing", &journal, complete),
        subscriber("Shipping", &journal, complete),
    ]);

    assert_eq!(processor.publish(&mut OrderPlaced::new()).unwrap(), Outcome::Completed);
    assert_eq!(journal.entries(), vec!["Billing", "Shipping"]);
}

#[test]
fn one_failure_does_not_stop_the_others() {
    let journal = Journal::default();
    let processor = processor(vec![
        subscriber("Billing", &journal, complete),
        subscriber("Mailer", &journal, fail),
        subscriber("Shipping", &journal, complete),
    ]);

    let err = processor.publish(&mut OrderPlaced::new()).unwrap_err();

    assert_eq!(journal.entries(), vec!["Billing", "Mailer", "Shipping"]);
    let failures = err.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].handler, "Mailer");
    assert!(!err.is_transient());
    assert_eq!(err.to_string(), "1 handler(s) failed: Mailer: handler failed: mailer down");
}

#[test]
fn aggregate_is_transient_only_if_every_failure_is() {
    let journal = Journal::default();
    let all_transient = processor(vec![
        subscriber("Mailer", &journal, transient),
        subscriber("Sms", &journal, transient),
    ]);
    let mixed = processor(vec![
        subscriber("Mailer", &journal, transient),
        subscriber("Ledger", &journal, fail),
    ]);

    let err = all_transient.publish(&mut OrderPlaced::new()).unwrap_err();
    assert!(matches!(err, ProcessorError::Aggregate(ref failures) if failures.len() == 2));
    assert!(err.is_transient());

    assert!(!mixed.publish(&mut OrderPlaced::new()).unwrap_err().is_transient());
}

#[test]
fn reject_wins_over_defer() {
    let journal = Journal::default();
    let processor = processor(vec![
        subscriber("Billing", &journal, |_| Ok(Outcome::defer())),
        subscriber("Fraud", &journal, |_| Ok(Outcome::reject("blocked card"))),
        subscriber("Shipping", &journal, complete),
    ]);

    let outcome = processor.publish(&mut OrderPlaced::new()).unwrap();

    assert_eq!(outcome, Outcome::reject("blocked card"));
    assert_eq!(journal.entries().len(), 3);
}

#[test]
fn subscribers_do_not_share_bag_writes() {
    let journal = Journal::default();
    let processor = processor(vec![
        subscriber("Billing", &journal, |context| {
            context.insert("invoice", "INV-1");
            Ok(Outcome::Completed)
        }),
        subscriber("Shipping", &journal, |context| {
            if context.get("invoice").is_some() {
                Ok(Outcome::reject("saw another handler's bag"))
            } else {
                Ok(Outcome::Completed)
            }
        }),
    ]);

    assert_eq!(processor.publish(&mut OrderPlaced::new()).unwrap(), Outcome::Completed);
}

#[test]
fn panicking_subscriber_is_reported_and_the_rest_still_run() {
    let journal = Journal::default();
    let processor = processor(vec![
        subscriber("Billing", &journal, complete),
        subscriber("Mailer", &journal, |_| panic!("smtp client crashed")),
        subscriber("Shipping", &journal, complete),
    ]);

    let err = processor.publish(&mut OrderPlaced::new()).unwrap_err();

    assert_eq!(journal.entries(), vec!["Billing", "Mailer", "Shipping"]);
    let failures = err.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].handler, "Mailer");
    assert!(matches!(
        failures[0].error,
        HandlerError::Panicked(ref text) if text == "smtp client crashed"
    ));
}

#[test]
fn one_subscribers_timeout_does_not_cancel_another() {
    let journal = Journal::default();
    let calls = Arc::new(AtomicU32::new(0));

    let slow = subscriber("Slow", &journal, |_| {
        thread::sleep(Duration::from_millis(20));
        Ok(Outcome::Completed)
    })
    .step(StepDescriptor::before(1, Timeout::new(Duration::from_millis(5))));

    let counter = Arc::clone(&calls);
    let flaky = HandlerRegistration::new("Flaky", move || {
        let counter = Arc::clone(&counter);
        move |_: &mut OrderPlaced, _: &mut RequestContext| -> HandlerResult {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(HandlerError::Transient("busy".into()))
            } else {
                Ok(Outcome::Completed)
            }
        }
    })
    .step(StepDescriptor::before(1, Retry::new("orders")));

    let mut handlers = HandlerRegistry::new();
    handlers.add(slow);
    handlers.add(flaky);
    let processor = CommandProcessor::builder()
        .handlers(handlers)
        .policies(PolicyRegistry::new().with_retry("orders", RetryPolicy::immediate(3)))
        .build();

    let err = processor.publish(&mut OrderPlaced::new()).unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    let failures = err.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].handler, "Slow");
    assert!(matches!(failures[0].error, HandlerError::Timeout(_)));
}
