//! tradegraph - a multi-agent trading workflow
//!
//! Four analysts gather market, sentiment, news and fundamentals reports
//! through tools, a Bull/Bear debate feeds a Research Manager, a Trader turns
//! the plan into a proposal, and a three-way risk debate ends with a Risk
//! Judge's final decision. Every model call goes through one process-wide
//! rate limiter.
//!
//! # Library Usage
//!
//! ```rust,no_run
//! use tradegraph::models::{TradeRequest, TradegraphConfig, StreamEvent};
//! use tradegraph::agents::{WorkflowRunner, WorkflowServices};
//! use tradegraph::memory::MemoryRegistry;
//! use tradegraph::tools::Toolkit;
//! ```

pub use tradegraph_agents as agents;
pub use tradegraph_memory as memory;
pub use tradegraph_models as models;
pub use tradegraph_tools as tools;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;
use tradegraph_agents::{
    AgentError, ClaudeCliModel, RateLimitedModel, RateLimiter, WorkflowRunner, WorkflowServices,
};
use tradegraph_memory::MemoryRegistry;
use tradegraph_models::{CredentialsConfig, TradegraphConfig};
use tradegraph_tools::Toolkit;

/// Read and parse a TOML configuration file.
pub fn load_config(path: impl AsRef<Path>) -> Result<TradegraphConfig, anyhow::Error> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("Failed to parse config: {}", path.display()))
}

/// Names from `required_env` that `lookup` reports as unset or blank.
pub fn missing_credentials<F>(config: &CredentialsConfig, lookup: F) -> Vec<String>
where
    F: Fn(&str) -> Option<String>,
{
    config
        .required_env
        .iter()
        .filter(|name| lookup(name).map_or(true, |value| value.trim().is_empty()))
        .cloned()
        .collect()
}

/// Fail fast when a required credential is absent from the environment.
pub fn check_credentials(config: &CredentialsConfig) -> Result<(), AgentError> {
    let missing = missing_credentials(config, |name| std::env::var(name).ok());
    if missing.is_empty() {
        return Ok(());
    }
    Err(AgentError::Configuration(format!(
        "missing required environment variables: {}",
        missing.join(", ")
    )))
}

/// Assemble the shared services: one rate limiter for both models, the
/// production toolkit and the memory namespaces.
pub fn build_services(config: &TradegraphConfig) -> Result<WorkflowServices, anyhow::Error> {
    let limiter = Arc::new(RateLimiter::from_seconds(
        config.rate_limit.min_interval_seconds,
    ));
    let timeout = Duration::from_secs(config.models.timeout_seconds);
    let quick = ClaudeCliModel::new(config.models.quick_model.clone(), timeout);
    let deep = ClaudeCliModel::new(config.models.deep_model.clone(), timeout);

    let toolkit = Toolkit::from_config(&config.tools).context("Failed to build toolkit")?;
    let memories =
        MemoryRegistry::from_config(&config.memory).context("Failed to open memory store")?;

    info!(
        quick_model = %config.models.quick_model,
        deep_model = %config.models.deep_model,
        min_interval_ms = limiter.min_interval().as_millis() as u64,
        tools = toolkit.len(),
        "Services ready"
    );

    Ok(WorkflowServices {
        quick_model: Arc::new(RateLimitedModel::new(Arc::new(quick), limiter.clone())),
        deep_model: Arc::new(RateLimitedModel::new(Arc::new(deep), limiter)),
        toolkit,
        memories,
        workflow: config.workflow.clone(),
        lookback_days: config.tools.lookback_days,
    })
}

/// Build a runner from configuration after checking credentials.
pub fn build_runner(config: &TradegraphConfig) -> Result<WorkflowRunner, anyhow::Error> {
    check_credentials(&config.credentials)?;
    Ok(WorkflowRunner::new(build_services(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn offline_config() -> TradegraphConfig {
        let mut config = TradegraphConfig::default();
        config.credentials.required_env.clear();
        config.tools.finnhub_api_key_env = "TRADEGRAPH_TEST_UNSET_FINNHUB".to_string();
        config.tools.search_api_key_env = "TRADEGRAPH_TEST_UNSET_SEARCH".to_string();
        config.memory.embedding_api_key_env = "TRADEGRAPH_TEST_UNSET_EMBED".to_string();
        config
    }

    #[test]
    fn load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[workflow]\nmax_debate_rounds = 3\n\n[rate_limit]\nmin_interval_seconds = 2.0").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.workflow.max_debate_rounds, 3);
        assert_eq!(config.workflow.max_risk_rounds, 1);
        assert_eq!(config.rate_limit.min_interval_seconds, 2.0);
    }

    #[test]
    fn load_config_reports_path() {
        let err = load_config("/nonexistent/tradegraph.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/tradegraph.toml"));
    }

    #[test]
    fn missing_and_blank_credentials_are_reported() {
        let env: HashMap<&str, &str> = [("PRESENT", "abc"), ("BLANK", "  ")].into();
        let config = CredentialsConfig {
            required_env: vec!["PRESENT".into(), "BLANK".into(), "ABSENT".into()],
        };
        let missing = missing_credentials(&config, |name| env.get(name).map(|v| v.to_string()));
        assert_eq!(missing, vec!["BLANK", "ABSENT"]);
    }

    #[test]
    fn absent_credential_is_a_configuration_error() {
        let config = CredentialsConfig {
            required_env: vec!["TRADEGRAPH_TEST_UNSET_CREDENTIAL".to_string()],
        };
        let err = check_credentials(&config).unwrap_err();
        assert!(matches!(err, AgentError::Configuration(_)));
        assert!(err.to_string().contains("TRADEGRAPH_TEST_UNSET_CREDENTIAL"));
    }

    #[test]
    fn build_runner_refuses_missing_credentials() {
        let mut config = offline_config();
        config.credentials.required_env = vec!["TRADEGRAPH_TEST_UNSET_CREDENTIAL".to_string()];
        let err = build_runner(&config).err().unwrap();
        assert!(err.to_string().starts_with("Configuration error"));
    }

    #[test]
    fn services_share_one_limiter() {
        let services = build_services(&offline_config()).unwrap();
        assert!(Arc::ptr_eq(
            services.quick_model.limiter(),
            services.deep_model.limiter()
        ));
        assert_eq!(
            services.quick_model.limiter().min_interval(),
            Duration::from_secs(10)
        );
        assert_eq!(services.toolkit.len(), 6);
        assert_eq!(services.lookback_days, 30);
        assert_eq!(services.workflow.max_steps, 100);
    }
}
