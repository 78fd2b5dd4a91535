use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};
use tradegraph_models::{Message, StateUpdate, WorkflowState};
use tradegraph_tools::Toolkit;

use crate::error::AgentError;
use crate::graph::Node;

/// Executes the tool calls pending on the last message. Tool failures are
/// returned to the model as text, never raised.
pub struct ToolExecutorNode {
    toolkit: Arc<Toolkit>,
}

impl ToolExecutorNode {
    pub fn new(toolkit: Toolkit) -> Self {
        Self {
            toolkit: Arc::new(toolkit),
        }
    }
}

#[async_trait]
impl Node for ToolExecutorNode {
    async fn run(&self, state: &WorkflowState) -> Result<StateUpdate, AgentError> {
        let calls = state
            .last_message()
            .map(|m| m.pending_tool_calls().to_vec())
            .unwrap_or_default();
        if calls.is_empty() {
            warn!("Tool node reached without pending tool calls");
            return Ok(StateUpdate::default());
        }

        let mut handles = Vec::with_capacity(calls.len());
        for call in &calls {
            let toolkit = Arc::clone(&self.toolkit);
            let name = call.name.clone();
            let arguments = call.arguments.clone();
            handles.push(tokio::spawn(async move {
                toolkit.call(&name, arguments).await
            }));
        }

        let mut results = Vec::with_capacity(calls.len());
        for (call, handle) in calls.iter().zip(handles) {
            let content = match handle.await {
                Ok(Ok(output)) => {
                    info!(tool = %call.name, chars = output.len(), "Tool succeeded");
                    output
                }
                Ok(Err(e)) => {
                    warn!(tool = %call.name, error = %e, "Tool failed");
                    format!("Error executing {}: {e}", call.name)
                }
                Err(e) => {
                    warn!(tool = %call.name, error = %e, "Tool task panicked");
                    format!("Error executing {}: {e}", call.name)
                }
            };
            results.push(Message::tool_result(call.id.clone(), call.name.clone(), content));
        }

        Ok(StateUpdate::append_messages(results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_state, tool_call_reply, StaticTool};
    use tradegraph_models::MessagesUpdate;

    fn toolkit() -> Toolkit {
        Toolkit::new()
            .with_tool(Arc::new(StaticTool::new("get_price_history", "Date,Close\n2024-05-01,100")))
            .with_tool(Arc::new(StaticTool::failing("get_company_news", "upstream 503")))
    }

    fn results(update: StateUpdate) -> Vec<Message> {
        match update.messages {
            Some(MessagesUpdate::Append(messages)) => messages,
            other => panic!("unexpected messages update: {other:?}"),
        }
    }

    #[tokio::test]
    async fn answers_each_call_in_order() {
        let mut state = sample_state();
        let mut request = tool_call_reply("get_price_history", serde_json::json!({"symbol": "AAPL"}));
        request
            .tool_calls
            .extend(tool_call_reply("get_company_news", serde_json::json!({})).tool_calls);
        let ids: Vec<String> = request.tool_calls.iter().map(|c| c.id.clone()).collect();
        state.messages.push(request.into_message());

        let messages = results(ToolExecutorNode::new(toolkit()).run(&state).await.unwrap());
        assert_eq!(messages.len(), 2);
        match (&messages[0], &messages[1]) {
            (
                Message::Tool { tool_call_id: first, content: ok, .. },
                Message::Tool { tool_call_id: second, content: err, .. },
            ) => {
                assert_eq!(first, &ids[0]);
                assert_eq!(second, &ids[1]);
                assert!(ok.starts_with("Date,Close"));
                assert!(err.starts_with("Error executing get_company_news:"));
                assert!(err.contains("upstream 503"));
            }
            other => panic!("expected tool results, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_as_text() {
        let mut state = sample_state();
        state
            .messages
            .push(tool_call_reply("get_weather", serde_json::json!({})).into_message());

        let messages = results(ToolExecutorNode::new(toolkit()).run(&state).await.unwrap());
        assert!(messages[0]
            .content()
            .starts_with("Error executing get_weather: Unknown tool"));
    }

    #[tokio::test]
    async fn nothing_pending_is_a_no_op() {
        let update = ToolExecutorNode::new(toolkit())
            .run(&sample_state())
            .await
            .unwrap();
        assert_eq!(update, StateUpdate::default());
    }
}
