use tradegraph_models::{InvestmentSide, RiskSpeaker, WorkflowState, WorkflowConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalystRoute {
    /// Run the pending tool calls, then return to the same analyst.
    Tools,
    /// The report is final; move to the next phase.
    Continue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvestmentRoute {
    Debator(InvestmentSide),
    ResearchManager,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskRoute {
    Debator(RiskSpeaker),
    RiskJudge,
}

/// Routes on whether the last message still has pending tool calls.
pub fn analyst_route(state: &WorkflowState) -> AnalystRoute {
    match state.last_message() {
        Some(message) if !message.pending_tool_calls().is_empty() => AnalystRoute::Tools,
        _ => AnalystRoute::Continue,
    }
}

/// Debate continuation rules, parameterized by the configured round limits.
/// Caps are checked before speaker rotation in both debates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebateRouter {
    pub max_debate_rounds: u32,
    pub max_risk_rounds: u32,
}

impl DebateRouter {
    pub fn new(max_debate_rounds: u32, max_risk_rounds: u32) -> Self {
        Self {
            max_debate_rounds,
            max_risk_rounds,
        }
    }

    pub fn from_config(config: &WorkflowConfig) -> Self {
        Self::new(config.max_debate_rounds, config.max_risk_rounds)
    }

    pub fn investment(&self, state: &WorkflowState) -> InvestmentRoute {
        let debate = &state.investment_debate;
        if debate.round_count >= self.max_debate_rounds.saturating_mul(2) {
            return InvestmentRoute::ResearchManager;
        }
        match debate.last_speaker() {
            Some(InvestmentSide::Bull) => InvestmentRoute::Debator(InvestmentSide::Bear),
            Some(InvestmentSide::Bear) | None => InvestmentRoute::Debator(InvestmentSide::Bull),
        }
    }

    pub fn risk(&self, state: &WorkflowState) -> RiskRoute {
        let debate = &state.risk_debate;
        if debate.round_count >= self.max_risk_rounds.saturating_mul(3) {
            return RiskRoute::RiskJudge;
        }
        match debate.latest_speaker {
            Some(speaker) => RiskRoute::Debator(speaker.next()),
            None => RiskRoute::Debator(RiskSpeaker::Risky),
        }
    }
}

impl Default for DebateRouter {
    fn default() -> Self {
        Self::from_config(&WorkflowConfig::default())
    }
}
