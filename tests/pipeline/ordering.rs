use courier_rust::{
    CommandProcessor, ConfigurationError, HandlerRegistration, HandlerRegistry, HandlerResult, Outcome,
    ProcessorError, RequestContext, StepDescriptor,
};

use crate::support::{Journal, Mark, PlaceOrder};

fn registration(journal: &Journal, outcome: Outcome) -> HandlerRegistration<PlaceOrder> {
    let journal = journal.clone();
    HandlerRegistration::new("PlaceOrderHandler", move || {
        let journal = journal.clone();
        let outcome = outcome.clone();
        move |_: &mut PlaceOrder, _: &mut RequestContext| -> HandlerResult {
            journal.push("body");
            Ok(outcome.clone())
        }
    })
}

fn processor(registration: HandlerRegistration<PlaceOrder>) -> CommandProcessor {
    let mut handlers = HandlerRegistry::new();
    handlers.add(registration);
    CommandProcessor::builder().handlers(handlers).build()
}

#[test]
fn steps_wrap_the_body_in_step_order() {
    let journal = Journal::default();
    let processor = processor(
        registration(&journal, Outcome::Completed)
            .step(StepDescriptor::after(1, Mark::new("audit", &journal)))
            .step(StepDescriptor::before(2, Mark::new("validate", &journal)))
            .step(StepDescriptor::before(1, Mark::new("log", &journal))),
    );

    let outcome = processor.send(&mut PlaceOrder::new("tea", 1)).unwrap();

    assert_eq!(outcome, Outcome::Completed);
    assert_eq!(journal.entries(), vec!["log", "validate", "body", "audit"]);
}

#[test]
fn after_steps_only_run_when_the_body_completes() {
    let journal = Journal::default();
    let processor = processor(
        registration(&journal, Outcome::defer())
            .step(StepDescriptor::before(1, Mark::new("log", &journal)))
            .step(StepDescriptor::after(1, Mark::new("audit", &journal))),
    );

    let outcome = processor.send(&mut PlaceOrder::new("tea", 1)).unwrap();

    assert_eq!(outcome, Outcome::defer());
    assert_eq!(journal.entries(), vec!["log", "body"]);
}

#[test]
fn each_dispatch_gets_fresh_steps() {
    let journal = Journal::default();
    let processor = processor(
        registration(&journal, Outcome::Completed).step(StepDescriptor::before(1, Mark::new("log", &journal))),
    );

    processor.send(&mut PlaceOrder::new("tea", 1)).unwrap();
    processor.send(&mut PlaceOrder::new("tea", 2)).unwrap();

    assert_eq!(journal.count("log"), 2);
    assert_eq!(journal.count("body"), 2);
}

#[test]
fn duplicate_step_fails_before_anything_runs() {
    let journal = Journal::default();
    let processor = processor(
        registration(&journal, Outcome::Completed)
            .step(StepDescriptor::before(1, Mark::new("log", &journal)))
            .step(StepDescriptor::before(1, Mark::new("validate", &journal))),
    );

    let err = processor.send(&mut PlaceOrder::new("tea", 1)).unwrap_err();

    assert!(matches!(
        err,
        ProcessorError::Configuration(ConfigurationError::DuplicateStep { step: 1, .. })
    ));
    assert!(journal.entries().is_empty());
}

#[test]
fn same_step_number_on_both_sides_is_allowed() {
    let journal = Journal::default();
    let processor = processor(
        registration(&journal, Outcome::Completed)
            .step(StepDescriptor::before(1, Mark::new("log", &journal)))
            .step(StepDescriptor::after(1, Mark::new("audit", &journal))),
    );

    processor.send(&mut PlaceOrder::new("tea", 1)).unwrap();

    assert_eq!(journal.entries(), vec!["log", "body", "audit"]);
}
