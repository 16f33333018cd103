use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use super::cancellation::CancellationHandle;
use crate::feature_switch::FeatureSwitchRegistry;
use crate::message::Message;
use crate::policy::PolicyRegistry;

/// Per-dispatch scratch space.
///
/// A fresh context is created for every `send`/`publish` call and owned by that
/// call alone. Steps use the bag to pass state along the chain; policies and
/// feature switches are shared, read-only registries.
#[derive(Debug)]
pub struct RequestContext {
    bag: HashMap<String, Value>,
    originating_message: Option<Message>,
    policies: Option<Arc<PolicyRegistry>>,
    feature_switches: Option<Arc<FeatureSwitchRegistry>>,
    cancellation: CancellationHandle,
    span: tracing::Span,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            bag: HashMap::new(),
            originating_message: None,
            policies: None,
            feature_switches: None,
            cancellation: CancellationHandle::new(),
            span: tracing::Span::none(),
        }
    }

    pub fn with_policies(mut self, policies: Arc<PolicyRegistry>) -> Self {
        self.policies = Some(policies);
        self
    }

    pub fn with_feature_switches(mut self, switches: Arc<FeatureSwitchRegistry>) -> Self {
        self.feature_switches = Some(switches);
        self
    }

    pub fn with_originating_message(mut self, message: Message) -> Self {
        self.originating_message = Some(message);
        self
    }

    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    /// Copy for a second pipeline of the same dispatch.
    ///
    /// The bag is copied so steps of one handler cannot see writes made by
    /// another. The fork gets a child cancellation handle: it observes a
    /// cancel on this context, but its own timeouts stay local. Registries
    /// and span are shared.
    pub fn fork(&self) -> Self {
        Self {
            bag: self.bag.clone(),
            originating_message: self.originating_message.clone(),
            policies: self.policies.clone(),
            feature_switches: self.feature_switches.clone(),
            cancellation: self.cancellation.child(),
            span: self.span.clone(),
        }
    }

    /// Fill in registries the caller did not set.
    pub(crate) fn adopt(
        &mut self,
        policies: &Arc<PolicyRegistry>,
        switches: Option<&Arc<FeatureSwitchRegistry>>,
    ) {
        if self.policies.is_none() {
            self.policies = Some(Arc::clone(policies));
        }
        if self.feature_switches.is_none() {
            self.feature_switches = switches.cloned();
        }
    }

    pub(crate) fn set_span(&mut self, span: tracing::Span) {
        self.span = span;
    }

    pub fn bag(&self) -> &HashMap<String, Value> {
        &self.bag
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.bag.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.bag.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.bag.remove(key)
    }

    pub fn originating_message(&self) -> Option<&Message> {
        self.originating_message.as_ref()
    }

    pub fn policies(&self) -> Option<&PolicyRegistry> {
        self.policies.as_deref()
    }

    pub fn feature_switches(&self) -> Option<&FeatureSwitchRegistry> {
        self.feature_switches.as_deref()
    }

    pub fn cancellation(&self) -> &CancellationHandle {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn span(&self) -> &tracing::Span {
        &self.span
    }
}
