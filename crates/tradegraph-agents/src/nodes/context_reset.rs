use async_trait::async_trait;
use tracing::debug;
use tradegraph_models::{Message, StateUpdate, WorkflowState};

use crate::error::AgentError;
use crate::graph::Node;

pub const CONTINUATION_MARKER: &str = "Continue";

/// Discards the analyst-phase conversation before the debates start.
pub struct ContextResetNode;

#[async_trait]
impl Node for ContextResetNode {
    async fn run(&self, state: &WorkflowState) -> Result<StateUpdate, AgentError> {
        debug!(dropped = state.messages.len(), "Clearing message history");
        Ok(StateUpdate::replace_messages(vec![Message::human(
            CONTINUATION_MARKER,
        )]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_state;

    #[tokio::test]
    async fn leaves_a_single_marker() {
        let mut state = sample_state();
        state.messages.push(Message::tool_result("c1", "get_price_history", "rows"));
        state.messages.push(Message::agent("report"));

        let update = ContextResetNode.run(&state).await.unwrap();
        state.apply(update).unwrap();
        assert_eq!(state.messages, vec![Message::human("Continue")]);
        // Reports survive the reset
        assert_eq!(state.reports, sample_state().reports);
    }
}
