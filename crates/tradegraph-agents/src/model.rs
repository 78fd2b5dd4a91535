use async_trait::async_trait;
use tradegraph_models::{Message, ToolCall};
use tradegraph_tools::ToolSpec;

use crate::error::AgentError;

/// One outbound model call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelRequest {
    pub system: Option<String>,
    pub messages: Vec<Message>,
    /// Tools the model may request. Empty means plain completion.
    pub tools: Vec<ToolSpec>,
}

impl ModelRequest {
    /// A single-prompt request with no system instruction.
    pub fn prompt(text: impl Into<String>) -> Self {
        Self {
            system: None,
            messages: vec![Message::human(text)],
            tools: Vec::new(),
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelReply {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

impl ModelReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    pub fn into_message(self) -> Message {
        Message::agent_with_calls(self.content, self.tool_calls)
    }
}

/// A chat-completion capability. Mockable for testing.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn name(&self) -> &str;

    async fn invoke(&self, request: &ModelRequest) -> Result<ModelReply, AgentError>;
}

impl From<&str> for ModelReply {
    fn from(content: &str) -> Self {
        ModelReply::text(content)
    }
}

impl From<String> for ModelReply {
    fn from(content: String) -> Self {
        ModelReply::text(content)
    }
}
