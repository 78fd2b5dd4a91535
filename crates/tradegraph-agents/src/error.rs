use thiserror::Error;
use tradegraph_models::StateError;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Model invocation failed: {0}")]
    Invocation(String),

    #[error("Claude CLI error: {0}")]
    Cli(String),

    #[error("Model call timed out after {0} seconds")]
    Timeout(u64),

    #[error("Model response parse error: {0}")]
    Parse(String),

    #[error("Workflow aborted after {steps} steps without reaching the end")]
    WorkflowAborted { steps: usize },

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Unknown node: {0}")]
    UnknownNode(String),

    #[error("Invalid graph: {0}")]
    InvalidGraph(String),

    #[error("Memory error: {0}")]
    Memory(#[from] tradegraph_memory::MemoryError),

    #[error("Tool error: {0}")]
    Tool(#[from] tradegraph_tools::ToolError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
