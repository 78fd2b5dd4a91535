pub mod claude_cli;
pub mod compactor;
pub mod error;
pub mod graph;
pub mod model;
pub mod nodes;
pub mod parser;
pub mod prompts;
pub mod rate_limited;
pub mod rate_limiter;
pub mod router;
pub mod workflow;

pub mod test_support;

pub use claude_cli::ClaudeCliModel;
pub use error::AgentError;
pub use graph::{Graph, GraphBuilder, Node, StepOutcome, END};
pub use model::{ChatModel, ModelReply, ModelRequest};
pub use rate_limited::{RateLimitedModel, ToolBoundModel};
pub use rate_limiter::{RateLimitNotice, RateLimitObserver, RateLimitStats, RateLimiter};
pub use router::DebateRouter;
pub use workflow::{build_trading_graph, WorkflowRun, WorkflowRunner, WorkflowServices};
