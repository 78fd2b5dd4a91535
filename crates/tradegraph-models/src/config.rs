use serde::{Deserialize, Serialize};

/// Top-level configuration for tradegraph.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TradegraphConfig {
    pub workflow: WorkflowConfig,
    pub rate_limit: RateLimitConfig,
    pub models: ModelsConfig,
    pub memory: MemoryConfig,
    pub tools: ToolsConfig,
    pub credentials: CredentialsConfig,
}

/// Debate bounds and the engine's step cap.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Bull/Bear rounds; the debate ends after `2 * max_debate_rounds` turns.
    pub max_debate_rounds: u32,
    /// Risky/Safe/Neutral rounds; the debate ends after `3 * max_risk_rounds` turns.
    pub max_risk_rounds: u32,
    /// Hard cap on executed nodes before the run is aborted.
    pub max_steps: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_debate_rounds: 2,
            max_risk_rounds: 1,
            max_steps: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Minimum spacing between any two outbound model calls, process-wide.
    pub min_interval_seconds: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_interval_seconds: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelsConfig {
    /// Model for analysts, debators and the trader.
    pub quick_model: String,
    /// Model for the Research Manager and the Risk Judge.
    pub deep_model: String,
    pub timeout_seconds: u64,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            quick_model: "claude-3-5-haiku-latest".to_string(),
            deep_model: "claude-sonnet-4-5-20250929".to_string(),
            timeout_seconds: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MemoryConfig {
    /// SQLite file holding the memory namespaces. In-memory when unset.
    pub sqlite_path: Option<String>,
    pub embedding_dimension: usize,
    pub embedding_model: String,
    /// Env var holding the embedding API key. Zero vectors are used when it is unset.
    pub embedding_api_key_env: String,
    pub cache_max_capacity: u64,
    pub cache_ttl_seconds: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            sqlite_path: None,
            embedding_dimension: 1536,
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_api_key_env: "OPENAI_API_KEY".to_string(),
            cache_max_capacity: 1_000,
            cache_ttl_seconds: 3_600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToolsConfig {
    pub finnhub_api_key_env: String,
    pub search_api_key_env: String,
    /// Days of history analysts are told to request.
    pub lookback_days: u32,
    pub http_timeout_seconds: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            finnhub_api_key_env: "FINNHUB_API_KEY".to_string(),
            search_api_key_env: "TAVILY_API_KEY".to_string(),
            lookback_days: 30,
            http_timeout_seconds: 30,
        }
    }
}

/// Credentials that must be present before a run starts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CredentialsConfig {
    pub required_env: Vec<String>,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            required_env: vec!["FINNHUB_API_KEY".to_string()],
        }
    }
}
