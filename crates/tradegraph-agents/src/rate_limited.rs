use std::sync::Arc;

use async_trait::async_trait;
use tradegraph_tools::ToolSpec;

use crate::error::AgentError;
use crate::model::{ChatModel, ModelReply, ModelRequest};
use crate::rate_limiter::{RateLimitObserver, RateLimiter};

/// A [`ChatModel`] whose every call first passes through the shared limiter.
pub struct RateLimitedModel {
    inner: Arc<dyn ChatModel>,
    limiter: Arc<RateLimiter>,
    observer: Option<RateLimitObserver>,
}

impl RateLimitedModel {
    pub fn new(inner: Arc<dyn ChatModel>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            inner,
            limiter,
            observer: None,
        }
    }

    /// Same model and limiter, reporting waits to `observer`.
    pub fn with_observer(&self, observer: Option<RateLimitObserver>) -> Self {
        Self {
            inner: self.inner.clone(),
            limiter: self.limiter.clone(),
            observer,
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Declare tools for every call. The returned model still invokes
    /// through `self`, so the limiter cannot be bypassed.
    pub fn bind_tools(self: &Arc<Self>, tools: Vec<ToolSpec>) -> ToolBoundModel {
        ToolBoundModel {
            target: self.clone(),
            tools,
        }
    }
}

#[async_trait]
impl ChatModel for RateLimitedModel {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn invoke(&self, request: &ModelRequest) -> Result<ModelReply, AgentError> {
        self.limiter.acquire_with(self.observer.as_ref()).await;
        self.inner.invoke(request).await
    }
}

pub struct ToolBoundModel {
    target: Arc<RateLimitedModel>,
    tools: Vec<ToolSpec>,
}

impl ToolBoundModel {
    pub fn target(&self) -> &Arc<RateLimitedModel> {
        &self.target
    }

    pub fn tools(&self) -> &[ToolSpec] {
        &self.tools
    }
}

#[async_trait]
impl ChatModel for ToolBoundModel {
    fn name(&self) -> &str {
        self.target.name()
    }

    async fn invoke(&self, request: &ModelRequest) -> Result<ModelReply, AgentError> {
        let mut request = request.clone();
        request.tools = self.tools.clone();
        self.target.invoke(&request).await
    }
}
