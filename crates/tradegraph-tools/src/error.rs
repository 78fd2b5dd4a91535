use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("Upstream {service} returned {status}")]
    Upstream { service: &'static str, status: u16 },

    #[error("Market data error: {0}")]
    MarketData(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),
}
