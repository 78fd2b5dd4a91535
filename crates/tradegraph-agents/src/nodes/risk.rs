use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use tradegraph_memory::MemoryStore;
use tradegraph_models::{RiskSpeaker, StateUpdate, WorkflowState};

use super::recall;
use crate::error::AgentError;
use crate::graph::Node;
use crate::model::{ChatModel, ModelRequest};
use crate::prompts::{risk_debator_prompt, risk_judge_prompt, situation_summary};

const ROTATION: [RiskSpeaker; 3] = [RiskSpeaker::Risky, RiskSpeaker::Safe, RiskSpeaker::Neutral];

fn short_name(speaker: RiskSpeaker) -> &'static str {
    match speaker {
        RiskSpeaker::Risky => "Risky",
        RiskSpeaker::Safe => "Safe",
        RiskSpeaker::Neutral => "Neutral",
    }
}

/// One voice in the three-way risk debate over the trader's plan.
pub struct RiskDebatorNode {
    speaker: RiskSpeaker,
    model: Arc<dyn ChatModel>,
}

impl RiskDebatorNode {
    pub fn new(speaker: RiskSpeaker, model: Arc<dyn ChatModel>) -> Self {
        Self { speaker, model }
    }
}

#[async_trait]
impl Node for RiskDebatorNode {
    async fn run(&self, state: &WorkflowState) -> Result<StateUpdate, AgentError> {
        let plan = state.require_trader_plan()?;
        let debate = &state.risk_debate;
        let opponents: Vec<String> = ROTATION
            .iter()
            .filter(|s| **s != self.speaker)
            .filter_map(|s| {
                let response = debate.current_response(*s);
                (!response.is_empty()).then(|| format!("{}: {response}", short_name(*s)))
            })
            .collect();

        let prompt = risk_debator_prompt(self.speaker, plan, &debate.history, &opponents);
        let reply = self.model.invoke(&ModelRequest::prompt(prompt)).await?;

        let mut debate = debate.clone();
        debate.record(self.speaker, &reply.content);
        info!(
            node = self.speaker.label(),
            round = debate.round_count,
            "Risk debate turn recorded"
        );
        Ok(StateUpdate {
            risk_debate: Some(debate),
            ..Default::default()
        })
    }
}

/// Portfolio manager: final binding decision.
pub struct RiskJudgeNode {
    model: Arc<dyn ChatModel>,
    memory: MemoryStore,
}

impl RiskJudgeNode {
    pub fn new(model: Arc<dyn ChatModel>, memory: MemoryStore) -> Self {
        Self { model, memory }
    }
}

#[async_trait]
impl Node for RiskJudgeNode {
    async fn run(&self, state: &WorkflowState) -> Result<StateUpdate, AgentError> {
        let plan = state.require_trader_plan()?;
        let situation = situation_summary(&state.complete_reports()?);
        let reflections = recall(&self.memory, &situation).await?;

        let prompt = risk_judge_prompt(plan, &state.risk_debate.history, &reflections);
        let reply = self.model.invoke(&ModelRequest::prompt(prompt)).await?;
        info!(chars = reply.content.len(), "Final decision ready");

        Ok(StateUpdate {
            final_decision: Some(reply.content),
            ..Default::default()
        })
    }
}
