use std::sync::Arc;

use tracing::debug;

#[cfg(feature = "async")]
use async_trait::async_trait;

use crate::context::RequestContext;
use crate::handler::{HandlerResult, Next, Outcome, RequestHandler};
#[cfg(feature = "async")]
use crate::handler::{AsyncNext, AsyncRequestHandler};
use crate::inbox::{record, Inbox};
#[cfg(feature = "async")]
use crate::inbox::{record_async, AsyncInbox, InMemoryInbox};
use crate::request::Request;

/// What to do when a request was already handled under the same context key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OnceOnlyAction {
    /// Complete without running the rest of the chain.
    #[default]
    Skip,
    /// Refuse the request so the pump dead-letters it.
    Reject,
}

fn on_duplicate<R: Request>(request: &R, context_key: &str, action: OnceOnlyAction) -> HandlerResult {
    debug!(request_id = %request.id(), context_key, "request already handled");
    match action {
        OnceOnlyAction::Skip => Ok(Outcome::Completed),
        OnceOnlyAction::Reject => Ok(Outcome::reject(format!(
            "request {} already handled for {}",
            request.id(),
            context_key
        ))),
    }
}

/// Idempotent consumption: the rest of the chain runs at most once per
/// request id and context key.
#[derive(Clone)]
pub struct UseInbox {
    inbox: Arc<dyn Inbox>,
    context_key: String,
    on_exists: OnceOnlyAction,
}

impl UseInbox {
    pub const NAME: &'static str = "UseInbox";

    pub fn new(inbox: Arc<dyn Inbox>, context_key: impl Into<String>) -> Self {
        Self {
            inbox,
            context_key: context_key.into(),
            on_exists: OnceOnlyAction::Skip,
        }
    }

    pub fn on_exists(mut self, action: OnceOnlyAction) -> Self {
        self.on_exists = action;
        self
    }
}

impl<R: Request> RequestHandler<R> for UseInbox {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn handle(
        &mut self,
        request: &mut R,
        context: &mut RequestContext,
        next: &mut Next<'_, R>,
    ) -> HandlerResult {
        let id = request.id();
        if self.inbox.exists(id, &self.context_key)? {
            return on_duplicate(request, &self.context_key, self.on_exists);
        }
        let outcome = next.run(request, context)?;
        if outcome.is_completed() {
            record(self.inbox.as_ref(), id, &self.context_key)?;
        }
        Ok(outcome)
    }
}

#[cfg(feature = "async")]
#[derive(Clone)]
pub struct UseInboxAsync {
    inbox: Arc<dyn AsyncInbox>,
    context_key: String,
    on_exists: OnceOnlyAction,
}

#[cfg(feature = "async")]
impl UseInboxAsync {
    pub fn new(inbox: Arc<dyn AsyncInbox>, context_key: impl Into<String>) -> Self {
        Self {
            inbox,
            context_key: context_key.into(),
            on_exists: OnceOnlyAction::Skip,
        }
    }

    pub fn on_exists(mut self, action: OnceOnlyAction) -> Self {
        self.on_exists = action;
        self
    }
}

#[cfg(feature = "async")]
#[async_trait]
impl<R: Request> AsyncRequestHandler<R> for UseInboxAsync {
    fn name(&self) -> &str {
        UseInbox::NAME
    }

    async fn handle(
        &mut self,
        request: &mut R,
        context: &mut RequestContext,
        next: &mut AsyncNext<'_, R>,
    ) -> HandlerResult {
        let id = request.id();
        if self.inbox.exists(id, &self.context_key).await? {
            return on_duplicate(request, &self.context_key, self.on_exists);
        }
        let outcome = next.run(request, context).await?;
        if outcome.is_completed() {
            record_async(self.inbox.as_ref(), id, &self.context_key).await?;
        }
        Ok(outcome)
    }
}

/// Processor-wide inbox: every handler that does not declare its own
/// [`UseInbox`] step gets one ahead of all its other steps.
#[derive(Clone)]
pub struct InboxConfiguration {
    inbox: Option<Arc<dyn Inbox>>,
    #[cfg(feature = "async")]
    async_inbox: Option<Arc<dyn AsyncInbox>>,
    context_key: Option<String>,
    on_exists: OnceOnlyAction,
}

impl InboxConfiguration {
    pub fn new(inbox: Arc<dyn Inbox>) -> Self {
        Self {
            inbox: Some(inbox),
            #[cfg(feature = "async")]
            async_inbox: None,
            context_key: None,
            on_exists: OnceOnlyAction::Skip,
        }
    }

    /// Use one in-memory inbox for both sync and async pipelines.
    #[cfg(feature = "async")]
    pub fn in_memory(inbox: InMemoryInbox) -> Self {
        let mut config = Self::new(Arc::new(inbox.clone()));
        config.async_inbox = Some(Arc::new(inbox));
        config
    }

    #[cfg(feature = "async")]
    pub fn with_async_inbox(mut self, inbox: Arc<dyn AsyncInbox>) -> Self {
        self.async_inbox = Some(inbox);
        self
    }

    /// Scope every handler to one key. By default each handler is scoped by
    /// its registration name.
    pub fn with_context_key(mut self, key: impl Into<String>) -> Self {
        self.context_key = Some(key.into());
        self
    }

    pub fn on_exists(mut self, action: OnceOnlyAction) -> Self {
        self.on_exists = action;
        self
    }

    pub fn context_key_for(&self, handler: &str) -> String {
        self.context_key
            .clone()
            .unwrap_or_else(|| handler.to_string())
    }

    pub(crate) fn step_for(&self, handler: &str) -> Option<UseInbox> {
        self.inbox.as_ref().map(|inbox| {
            UseInbox::new(Arc::clone(inbox), self.context_key_for(handler)).on_exists(self.on_exists)
        })
    }

    #[cfg(feature = "async")]
    pub(crate) fn async_step_for(&self, handler: &str) -> Option<UseInboxAsync> {
        self.async_inbox.as_ref().map(|inbox| {
            UseInboxAsync::new(Arc::clone(inbox), self.context_key_for(handler))
                .on_exists(self.on_exists)
        })
    }
}
