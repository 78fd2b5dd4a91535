pub mod config;
pub mod event;
pub mod message;
pub mod state;
pub mod trade_request;

pub use config::{
    CredentialsConfig, MemoryConfig, ModelsConfig, RateLimitConfig, ToolsConfig,
    TradegraphConfig, WorkflowConfig,
};
pub use event::StreamEvent;
pub use message::{Message, ToolCall};
pub use state::{
    CompleteReports, InvestmentDebateState, InvestmentSide, MessagesUpdate, ReportKind, Reports,
    RiskDebateState, RiskSpeaker, StateError, StateUpdate, WorkflowState,
};
pub use trade_request::TradeRequest;
