use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use tradegraph_memory::MemoryStore;
use tradegraph_models::{InvestmentSide, StateUpdate, WorkflowState};

use super::recall;
use crate::error::AgentError;
use crate::graph::Node;
use crate::model::{ChatModel, ModelRequest};
use crate::prompts::{investment_debator_prompt, research_manager_prompt, situation_summary};

/// One side of the Bull/Bear debate.
pub struct InvestmentDebatorNode {
    side: InvestmentSide,
    model: Arc<dyn ChatModel>,
    memory: MemoryStore,
}

impl InvestmentDebatorNode {
    pub fn new(side: InvestmentSide, model: Arc<dyn ChatModel>, memory: MemoryStore) -> Self {
        Self {
            side,
            model,
            memory,
        }
    }
}

#[async_trait]
impl Node for InvestmentDebatorNode {
    async fn run(&self, state: &WorkflowState) -> Result<StateUpdate, AgentError> {
        let situation = situation_summary(&state.complete_reports()?);
        let reflections = recall(&self.memory, &situation).await?;
        let debate = &state.investment_debate;
        let prompt = investment_debator_prompt(
            self.side,
            &situation,
            &debate.history,
            &debate.current_response,
            &reflections,
        );

        let reply = self.model.invoke(&ModelRequest::prompt(prompt)).await?;
        let mut debate = debate.clone();
        debate.record(self.side, &reply.content);
        info!(
            node = self.side.label(),
            round = debate.round_count,
            "Debate turn recorded"
        );

        Ok(StateUpdate {
            investment_debate: Some(debate),
            ..Default::default()
        })
    }
}

/// Judges the Bull/Bear debate and writes the investment plan.
pub struct ResearchManagerNode {
    model: Arc<dyn ChatModel>,
    memory: MemoryStore,
}

impl ResearchManagerNode {
    pub fn new(model: Arc<dyn ChatModel>, memory: MemoryStore) -> Self {
        Self { model, memory }
    }
}

#[async_trait]
impl Node for ResearchManagerNode {
    async fn run(&self, state: &WorkflowState) -> Result<StateUpdate, AgentError> {
        let situation = situation_summary(&state.complete_reports()?);
        let reflections = recall(&self.memory, &situation).await?;
        let prompt = research_manager_prompt(&state.investment_debate.history, &reflections);

        let reply = self.model.invoke(&ModelRequest::prompt(prompt)).await?;
        info!(chars = reply.content.len(), "Investment plan ready");
        Ok(StateUpdate {
            investment_plan: Some(reply.content),
            ..Default::default()
        })
    }
}
