//! Deterministic stand-ins for models and tools so whole workflows can run
//! without a model provider or network access.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use tradegraph_memory::{MemoryError, MemoryStore, ZeroEmbedder};
use tradegraph_models::{Message, Reports, ToolCall, TradeRequest, WorkflowState};
use tradegraph_tools::{Tool, ToolError};

use crate::error::AgentError;
use crate::model::{ChatModel, ModelReply, ModelRequest};
use crate::parser::new_call_id;

/// Replays a fixed list of replies and records every request it receives.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<ModelReply>>,
    /// Returned once `replies` runs out.
    fallback: Option<ModelReply>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    pub fn new<I, R>(replies: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<ModelReply>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answers every request with the same text.
    pub fn repeating(text: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: Some(ModelReply::text(text)),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn invoke(&self, request: &ModelRequest) -> Result<ModelReply, AgentError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let next = self
            .replies
            .lock()
            .map_err(|e| AgentError::Invocation(e.to_string()))?
            .pop_front();
        next.or_else(|| self.fallback.clone())
            .ok_or_else(|| AgentError::Invocation("scripted model has no replies left".to_string()))
    }
}

/// Plays every role of the trading workflow.
///
/// Analysts request their first bound tool once, then report; debators and
/// managers answer with a short line naming their role.
pub struct ScenarioModel {
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScenarioModel {
    pub fn new() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    fn role_of(prompt: &str) -> &'static str {
        const ROLES: [(&str, &str); 8] = [
            ("You are a Bull Analyst", "Bull case"),
            ("You are a Bear Analyst", "Bear case"),
            ("As the Research Manager", "Investment plan: BUY"),
            ("You are a trading agent", "FINAL TRANSACTION PROPOSAL: **BUY**"),
            ("You are the Risky", "Risky view"),
            ("You are the Safe", "Safe view"),
            ("You are the Neutral", "Neutral view"),
            ("As the Portfolio Manager", "Final decision: BUY"),
        ];
        ROLES
            .iter()
            .find(|(marker, _)| prompt.starts_with(marker))
            .map(|(_, reply)| *reply)
            .unwrap_or("Acknowledged")
    }
}

impl Default for ScenarioModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatModel for ScenarioModel {
    fn name(&self) -> &str {
        "scenario"
    }

    async fn invoke(&self, request: &ModelRequest) -> Result<ModelReply, AgentError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        if let Some(tool) = request.tools.first() {
            let awaiting_data = !matches!(request.messages.last(), Some(Message::Tool { .. }));
            if awaiting_data {
                return Ok(tool_call_reply(&tool.name, serde_json::json!({})));
            }
            let system = request.system.as_deref().unwrap_or_default();
            let role = system.split('.').next().unwrap_or_default();
            return Ok(ModelReply::text(format!("Report: {role}")));
        }

        let prompt = request
            .messages
            .first()
            .map(Message::content)
            .unwrap_or_default();
        Ok(ModelReply::text(Self::role_of(prompt)))
    }
}

/// A tool with a canned answer, or a canned failure.
pub struct StaticTool {
    name: String,
    output: Result<String, String>,
}

impl StaticTool {
    pub fn new(name: &str, output: &str) -> Self {
        Self {
            name: name.to_string(),
            output: Ok(output.to_string()),
        }
    }

    pub fn failing(name: &str, reason: &str) -> Self {
        Self {
            name: name.to_string(),
            output: Err(reason.to_string()),
        }
    }
}

#[async_trait]
impl Tool for StaticTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Static test tool."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {}})
    }

    async fn call(&self, _arguments: serde_json::Value) -> Result<String, ToolError> {
        self.output.clone().map_err(ToolError::MarketData)
    }
}

/// A reply requesting a single tool call.
pub fn tool_call_reply(name: &str, arguments: serde_json::Value) -> ModelReply {
    ModelReply {
        content: String::new(),
        tool_calls: vec![ToolCall {
            id: new_call_id(),
            name: name.to_string(),
            arguments,
        }],
    }
}

pub fn sample_request() -> TradeRequest {
    TradeRequest::new(
        "AAPL",
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap_or_default(),
    )
}

/// A fresh state whose four reports are already written (`M`, `S`, `N`, `F`).
pub fn sample_state() -> WorkflowState {
    let mut state = WorkflowState::new(&sample_request());
    state.reports = Reports {
        market: Some("M".to_string()),
        sentiment: Some("S".to_string()),
        news: Some("N".to_string()),
        fundamentals: Some("F".to_string()),
    };
    state
}

/// An empty in-memory namespace with zero-vector embeddings.
pub fn memory_store(namespace: &str) -> Result<MemoryStore, MemoryError> {
    MemoryStore::in_memory(namespace, Arc::new(ZeroEmbedder::new(8)))
}
