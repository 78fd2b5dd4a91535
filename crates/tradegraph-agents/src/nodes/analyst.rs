use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use tradegraph_models::{ReportKind, Reports, StateUpdate, WorkflowState};

use crate::compactor::compact_messages;
use crate::error::AgentError;
use crate::graph::Node;
use crate::model::{ChatModel, ModelRequest};
use crate::prompts::analyst_system_prompt;

pub fn analyst_label(kind: ReportKind) -> &'static str {
    match kind {
        ReportKind::Market => "Market Analyst",
        ReportKind::Sentiment => "Social Analyst",
        ReportKind::News => "News Analyst",
        ReportKind::Fundamentals => "Fundamentals Analyst",
    }
}

/// Produces one report, looping through tool calls until the model
/// answers without requesting any.
pub struct AnalystNode {
    kind: ReportKind,
    /// Expected to have this analyst's tools bound.
    model: Arc<dyn ChatModel>,
    lookback_days: u32,
}

impl AnalystNode {
    pub fn new(kind: ReportKind, model: Arc<dyn ChatModel>, lookback_days: u32) -> Self {
        Self {
            kind,
            model,
            lookback_days,
        }
    }
}

#[async_trait]
impl Node for AnalystNode {
    async fn run(&self, state: &WorkflowState) -> Result<StateUpdate, AgentError> {
        let label = analyst_label(self.kind);
        let request = ModelRequest {
            system: Some(analyst_system_prompt(
                self.kind,
                &state.subject,
                state.as_of_date,
                self.lookback_days,
            )),
            messages: compact_messages(&state.messages),
            tools: Vec::new(),
        };

        let reply = self.model.invoke(&request).await?;
        if reply.has_tool_calls() {
            info!(node = label, calls = reply.tool_calls.len(), "Analyst requested tools");
            return Ok(StateUpdate {
                last_sender: Some(label.to_string()),
                ..StateUpdate::append_messages(vec![reply.into_message()])
            });
        }

        info!(node = label, chars = reply.content.len(), "Analyst report ready");
        Ok(StateUpdate {
            reports: Reports::only(self.kind, reply.content.clone()),
            last_sender: Some(label.to_string()),
            ..StateUpdate::append_messages(vec![reply.into_message()])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelReply;
    use crate::test_support::{sample_state, tool_call_reply, ScriptedModel};
    use tradegraph_models::{Message, MessagesUpdate};

    #[tokio::test]
    async fn tool_request_is_appended_without_report() {
        let model = Arc::new(ScriptedModel::new([tool_call_reply(
            "get_price_history",
            serde_json::json!({"symbol": "AAPL"}),
        )]));
        let node = AnalystNode::new(ReportKind::Market, model, 30);

        let update = node.run(&sample_state()).await.unwrap();
        assert!(update.reports.is_empty());
        assert_eq!(update.last_sender.as_deref(), Some("Market Analyst"));
        match update.messages {
            Some(MessagesUpdate::Append(messages)) => {
                assert_eq!(messages[0].pending_tool_calls()[0].name, "get_price_history");
            }
            other => panic!("unexpected messages update: {other:?}"),
        }
    }

    #[tokio::test]
    async fn final_answer_becomes_the_report() {
        let model = Arc::new(ScriptedModel::new([ModelReply::text("Sentiment is upbeat.")]));
        let node = AnalystNode::new(ReportKind::Sentiment, model.clone(), 30);

        let update = node.run(&sample_state()).await.unwrap();
        assert_eq!(update.reports.sentiment.as_deref(), Some("Sentiment is upbeat."));
        assert_eq!(update.last_sender.as_deref(), Some("Social Analyst"));
        assert_eq!(
            update.messages,
            Some(MessagesUpdate::Append(vec![Message::agent("Sentiment is upbeat.")]))
        );

        let request = &model.requests()[0];
        assert!(request.system.as_deref().unwrap().contains("social media analyst"));
    }

    #[tokio::test]
    async fn history_is_compacted_before_the_call() {
        let model = Arc::new(ScriptedModel::new(["News report"]));
        let node = AnalystNode::new(ReportKind::News, model.clone(), 7);

        let mut state = sample_state();
        state.messages.push(tool_call_reply("get_price_history", serde_json::json!({})).into_message());
        state.messages.push(Message::tool_result("x", "get_price_history", "rows"));
        state.messages.push(Message::agent("Market report"));
        node.run(&state).await.unwrap();

        let sent = &model.requests()[0].messages;
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|m| !m.is_tool_traffic()));
    }
}
