use courier_rust::steps::RequestLogging;
use courier_rust::{
    async_trait, AsyncHandlerRegistration, AsyncStepDescriptor, CommandProcessor, ConfigurationError, HandleAsync,
    HandlerError, HandlerRegistration, HandlerRegistry, HandlerResult, Outcome, ProcessorError, RequestContext,
};

use crate::support::{mappers, Journal, OrderPlaced, OutboxFixture, PlaceOrder};

struct ReserveStock {
    journal: Journal,
}

#[async_trait]
impl HandleAsync<PlaceOrder> for ReserveStock {
    async fn handle(&mut self, order: &mut PlaceOrder, _: &mut RequestContext) -> HandlerResult {
        tokio::task::yield_now().await;
        self.journal.push(format!("reserved {}", order.sku));
        Ok(Outcome::Completed)
    }
}

struct Notify {
    name: &'static str,
    fail: bool,
    journal: Journal,
}

#[async_trait]
impl HandleAsync<OrderPlaced> for Notify {
    async fn handle(&mut self, _: &mut OrderPlaced, _: &mut RequestContext) -> HandlerResult {
        self.journal.push(self.name);
        if self.fail {
            Err(HandlerError::Transient("gateway timeout".into()))
        } else {
            Ok(Outcome::Completed)
        }
    }
}

struct Crash;

#[async_trait]
impl HandleAsync<OrderPlaced> for Crash {
    async fn handle(&mut self, _: &mut OrderPlaced, _: &mut RequestContext) -> HandlerResult {
        tokio::task::yield_now().await;
        panic!("push gateway crashed")
    }
}

fn notify(name: &'static str, fail: bool, journal: &Journal) -> AsyncHandlerRegistration<OrderPlaced> {
    let journal = journal.clone();
    AsyncHandlerRegistration::new(name, move || Notify {
        name,
        fail,
        journal: journal.clone(),
    })
}

#[tokio::test]
async fn send_async_runs_the_async_registration() {
    let journal = Journal::default();
    let factory_journal = journal.clone();
    let mut handlers = HandlerRegistry::new();
    handlers.add_async(
        AsyncHandlerRegistration::new("ReserveStock", move || ReserveStock {
            journal: factory_journal.clone(),
        })
        .step(AsyncStepDescriptor::before(1, RequestLogging::new())),
    );
    let processor = CommandProcessor::builder().handlers(handlers).build();

    let outcome = processor.send_async(&mut PlaceOrder::new("tea", 1)).await.unwrap();

    assert_eq!(outcome, Outcome::Completed);
    assert_eq!(journal.entries(), vec!["reserved tea"]);
}

#[tokio::test]
async fn async_send_ignores_sync_registrations() {
    let mut handlers = HandlerRegistry::new();
    handlers.add(HandlerRegistration::new("PlaceOrderHandler", || {
        |_: &mut PlaceOrder, _: &mut RequestContext| -> HandlerResult { Ok(Outcome::Completed) }
    }));
    let processor = CommandProcessor::builder().handlers(handlers).build();

    let err = processor.send_async(&mut PlaceOrder::new("tea", 1)).await.unwrap_err();

    assert!(matches!(
        err,
        ProcessorError::Configuration(ConfigurationError::NoHandler { .. })
    ));
}

#[tokio::test]
async fn publish_async_aggregates_failures() {
    let journal = Journal::default();
    let mut handlers = HandlerRegistry::new();
    handlers
        .add_async(notify("Email", false, &journal))
        .add_async(notify("Sms", true, &journal))
        .add_async(notify("Push", false, &journal));
    let processor = CommandProcessor::builder().handlers(handlers).build();

    let err = processor.publish_async(&mut OrderPlaced::new()).await.unwrap_err();

    assert_eq!(journal.entries(), vec!["Email", "Sms", "Push"]);
    assert_eq!(err.failures().len(), 1);
    assert_eq!(err.failures()[0].handler, "Sms");
    assert!(err.is_transient());
}

#[tokio::test]
async fn publish_async_survives_a_panicking_subscriber() {
    let journal = Journal::default();
    let mut handlers = HandlerRegistry::new();
    handlers
        .add_async(notify("Email", false, &journal))
        .add_async(AsyncHandlerRegistration::new("Crash", || Crash))
        .add_async(notify("Sms", false, &journal));
    let processor = CommandProcessor::builder().handlers(handlers).build();

    let err = processor.publish_async(&mut OrderPlaced::new()).await.unwrap_err();

    assert_eq!(journal.entries(), vec!["Email", "Sms"]);
    assert_eq!(err.failures().len(), 1);
    assert!(matches!(err.failures()[0].error, HandlerError::Panicked(_)));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn post_async_sends_through_the_async_outbox() {
    let fixture = OutboxFixture::new();
    let processor = CommandProcessor::builder()
        .mappers(mappers())
        .outbox(fixture.mediator.clone())
        .build();

    let report = processor.post_async(&PlaceOrder::new("tea", 1)).await.unwrap();

    assert_eq!(report.sent, 1);
    assert_eq!(fixture.sent().len(), 1);
}

#[tokio::test]
async fn async_clear_skips_rolled_back_deposits() {
    let fixture = OutboxFixture::new();
    let processor = CommandProcessor::builder()
        .mappers(mappers())
        .outbox(fixture.mediator.clone())
        .build();

    let kept = processor.deposit_post_async(&PlaceOrder::new("tea", 1), None).await.unwrap();
    let tx = fixture.outbox.begin();
    let dropped = processor
        .deposit_post_async(&PlaceOrder::new("tea", 2), Some(&tx))
        .await
        .unwrap();
    tx.rollback();

    let report = processor.clear_outbox_async(&[kept, dropped]).await.unwrap();

    assert_eq!(report.sent, 1);
    assert_eq!(report.skipped_missing, 1);
    assert_eq!(fixture.sent().len(), 1);
}
