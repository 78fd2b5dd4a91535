//! Role nodes of the trading workflow.

pub mod analyst;
pub mod context_reset;
pub mod investment;
pub mod risk;
pub mod tool_executor;
pub mod trader;

pub use analyst::{analyst_label, AnalystNode};
pub use context_reset::ContextResetNode;
pub use investment::{InvestmentDebatorNode, ResearchManagerNode};
pub use risk::{RiskDebatorNode, RiskJudgeNode};
pub use tool_executor::ToolExecutorNode;
pub use trader::TraderNode;

use tradegraph_memory::MemoryStore;

use crate::error::AgentError;
use crate::prompts::reflections;

/// Recommendations spliced into debate and manager prompts.
const REFLECTIONS_PER_PROMPT: usize = 1;

async fn recall(memory: &MemoryStore, situation: &str) -> Result<String, AgentError> {
    let matches = memory
        .get_memories(situation, REFLECTIONS_PER_PROMPT)
        .await?;
    Ok(reflections(&matches))
}
