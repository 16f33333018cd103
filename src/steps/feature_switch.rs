use tracing::debug;

#[cfg(feature = "async")]
use async_trait::async_trait;

use crate::context::RequestContext;
use crate::feature_switch::FeatureSwitch;
use crate::handler::{HandlerResult, Next, Outcome, RequestHandler};
#[cfg(feature = "async")]
use crate::handler::{AsyncNext, AsyncRequestHandler};
use crate::request::Request;

/// Skips the rest of the chain when the handler is switched off.
///
/// A fixed switch ignores the registry; otherwise the context's
/// [`FeatureSwitchRegistry`](crate::feature_switch::FeatureSwitchRegistry) is
/// consulted, and a missing registry means on.
#[derive(Clone, Debug)]
pub struct FeatureSwitchStep {
    handler: String,
    fixed: Option<FeatureSwitch>,
}

impl FeatureSwitchStep {
    pub const NAME: &'static str = "FeatureSwitch";

    pub fn config(handler: impl Into<String>) -> Self {
        Self {
            handler: handler.into(),
            fixed: None,
        }
    }

    pub fn fixed(handler: impl Into<String>, switch: FeatureSwitch) -> Self {
        Self {
            handler: handler.into(),
            fixed: Some(switch),
        }
    }

    fn is_on(&self, context: &RequestContext) -> bool {
        match self.fixed {
            Some(switch) => switch == FeatureSwitch::On,
            None => context
                .feature_switches()
                .map_or(true, |switches| switches.is_on(&self.handler)),
        }
    }
}

impl<R: Request> RequestHandler<R> for FeatureSwitchStep {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn handle(
        &mut self,
        request: &mut R,
        context: &mut RequestContext,
        next: &mut Next<'_, R>,
    ) -> HandlerResult {
        if !self.is_on(context) {
            debug!(handler = %self.handler, request_id = %request.id(), "handler switched off");
            return Ok(Outcome::Completed);
        }
        next.run(request, context)
    }
}

#[cfg(feature = "async")]
#[async_trait]
impl<R: Request> AsyncRequestHandler<R> for FeatureSwitchStep {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn handle(
        &mut self,
        request: &mut R,
        context: &mut RequestContext,
        next: &mut AsyncNext<'_, R>,
    ) -> HandlerResult {
        if !self.is_on(context) {
            debug!(handler = %self.handler, request_id = %request.id(), "handler switched off");
            return Ok(Outcome::Completed);
        }
        next.run(request, context).await
    }
}
