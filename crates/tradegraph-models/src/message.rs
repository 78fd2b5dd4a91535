use serde::{Deserialize, Serialize};

/// A tool invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// Identifier linking the call to its `Message::Tool` result.
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// One entry of the conversation threaded through the analyst phase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    Human {
        content: String,
    },
    Agent {
        content: String,
        /// Pending tool calls. Empty means the message is a finalized report.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        tool_call_id: String,
        name: String,
        content: String,
    },
}

impl Message {
    pub fn human(content: impl Into<String>) -> Self {
        Message::Human {
            content: content.into(),
        }
    }

    pub fn agent(content: impl Into<String>) -> Self {
        Message::Agent {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn agent_with_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Message::Agent {
            content: content.into(),
            tool_calls,
        }
    }

    pub fn tool_result(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Message::Tool {
            tool_call_id: tool_call_id.into(),
            name: name.into(),
            content: content.into(),
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Message::Human { content }
            | Message::Agent { content, .. }
            | Message::Tool { content, .. } => content,
        }
    }

    /// An agent response without pending tool calls.
    pub fn is_report(&self) -> bool {
        matches!(self, Message::Agent { tool_calls, .. } if tool_calls.is_empty())
    }

    /// Tool-call requests and tool results.
    pub fn is_tool_traffic(&self) -> bool {
        match self {
            Message::Agent { tool_calls, .. } => !tool_calls.is_empty(),
            Message::Tool { .. } => true,
            Message::Human { .. } => false,
        }
    }

    pub fn pending_tool_calls(&self) -> &[ToolCall] {
        match self {
            Message::Agent { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }
}
