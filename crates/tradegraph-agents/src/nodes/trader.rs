use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use tradegraph_memory::MemoryStore;
use tradegraph_models::{StateUpdate, WorkflowState};

use super::recall;
use crate::error::AgentError;
use crate::graph::Node;
use crate::model::{ChatModel, ModelRequest};
use crate::prompts::{situation_summary, trader_prompt};

pub const TRADER_LABEL: &str = "Trader";

/// Turns the investment plan into a concrete proposal.
pub struct TraderNode {
    model: Arc<dyn ChatModel>,
    memory: MemoryStore,
}

impl TraderNode {
    pub fn new(model: Arc<dyn ChatModel>, memory: MemoryStore) -> Self {
        Self { model, memory }
    }
}

#[async_trait]
impl Node for TraderNode {
    async fn run(&self, state: &WorkflowState) -> Result<StateUpdate, AgentError> {
        let plan = state.require_investment_plan()?;
        let situation = situation_summary(&state.complete_reports()?);
        let reflections = recall(&self.memory, &situation).await?;

        let prompt = trader_prompt(&state.subject, plan, &reflections);
        let reply = self.model.invoke(&ModelRequest::prompt(prompt)).await?;
        info!(chars = reply.content.len(), "Trader plan ready");

        Ok(StateUpdate {
            trader_plan: Some(reply.content),
            last_sender: Some(TRADER_LABEL.to_string()),
            ..Default::default()
        })
    }
}
