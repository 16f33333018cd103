use std::thread;

use tracing::warn;

#[cfg(feature = "async")]
use async_trait::async_trait;

use crate::context::RequestContext;
use crate::error::ConfigurationError;
use crate::handler::{HandlerError, HandlerResult, Next, RequestHandler};
#[cfg(feature = "async")]
use crate::handler::{AsyncNext, AsyncRequestHandler};
use crate::policy::RetryPolicy;
use crate::request::Request;

/// Re-runs the rest of the chain on transient errors, using a named
/// [`RetryPolicy`] from the context's policy registry.
#[derive(Clone, Debug)]
pub struct Retry {
    policy: String,
}

impl Retry {
    pub const NAME: &'static str = "Retry";

    pub fn new(policy: impl Into<String>) -> Self {
        Self {
            policy: policy.into(),
        }
    }

    fn resolve(&self, context: &RequestContext) -> Result<RetryPolicy, HandlerError> {
        context
            .policies()
            .and_then(|registry| registry.retry(&self.policy))
            .cloned()
            .ok_or_else(|| ConfigurationError::MissingPolicy(self.policy.clone()).into())
    }
}

fn retryable(err: &HandlerError, policy: &RetryPolicy, attempts: u32, context: &RequestContext) -> bool {
    err.is_transient() && policy.should_retry(attempts) && !context.is_cancelled()
}

impl<R: Request> RequestHandler<R> for Retry {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn handle(
        &mut self,
        request: &mut R,
        context: &mut RequestContext,
        next: &mut Next<'_, R>,
    ) -> HandlerResult {
        let policy = self.resolve(context)?;
        let mut attempts = 0;
        loop {
            attempts += 1;
            match next.run(request, context) {
                Err(err) if retryable(&err, &policy, attempts, context) => {
                    let delay = policy.delay_for(attempts);
                    warn!(
                        request_id = %request.id(),
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying after transient failure"
                    );
                    thread::sleep(delay);
                }
                other => return other,
            }
        }
    }
}

#[cfg(feature = "async")]
#[async_trait]
impl<R: Request> AsyncRequestHandler<R> for Retry {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn handle(
        &mut self,
        request: &mut R,
        context: &mut RequestContext,
        next: &mut AsyncNext<'_, R>,
    ) -> HandlerResult {
        let policy = self.resolve(context)?;
        let mut attempts = 0;
        loop {
            attempts += 1;
            match next.run(request, context).await {
                Err(err) if retryable(&err, &policy, attempts, context) => {
                    let delay = policy.delay_for(attempts);
                    warn!(
                        request_id = %request.id(),
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying after transient failure"
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }
}
