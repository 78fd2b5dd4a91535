use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use tradegraph_models::ToolsConfig;

use crate::company_news::CompanyNewsTool;
use crate::error::ToolError;
use crate::indicators::TechnicalIndicatorsTool;
use crate::price_history::PriceHistoryTool;
use crate::sources::market_data::{PriceSource, YahooPriceSource};
use crate::sources::news::{FinnhubNewsSource, NewsSource};
use crate::sources::search::{SearchBackend, TavilySearch};
use crate::tool::{Tool, ToolSpec};
use crate::web_search::{SearchTopic, WebSearchTool};

/// Registry of tools by name.
#[derive(Clone, Default)]
pub struct Toolkit {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl Toolkit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    /// Register a tool, replacing any previous tool of the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.values().map(|t| t.spec()).collect()
    }

    /// A toolkit holding only `names`. Unknown names are an error.
    pub fn subset(&self, names: &[&str]) -> Result<Toolkit, ToolError> {
        let mut out = Toolkit::new();
        for name in names {
            let tool = self
                .get(name)
                .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
            out.register(tool);
        }
        Ok(out)
    }

    /// Run a named tool.
    pub async fn call(&self, name: &str, arguments: serde_json::Value) -> Result<String, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        tool.call(arguments).await
    }

    /// The six production tools backed by Yahoo, Finnhub and Tavily.
    /// Missing API keys degrade the affected tools to an explanatory string.
    pub fn from_config(config: &ToolsConfig) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_seconds))
            .build()?;

        let prices: Arc<dyn PriceSource> = Arc::new(YahooPriceSource::new(client.clone()));

        let news: Option<Arc<dyn NewsSource>> = match read_key(&config.finnhub_api_key_env) {
            Some(key) => Some(Arc::new(FinnhubNewsSource::new(key, client.clone()))),
            None => {
                warn!(env = %config.finnhub_api_key_env, "News API key not set, company news disabled");
                None
            }
        };
        let search: Option<Arc<dyn SearchBackend>> = match read_key(&config.search_api_key_env) {
            Some(key) => Some(Arc::new(TavilySearch::new(key, client))),
            None => {
                warn!(env = %config.search_api_key_env, "Search API key not set, web search disabled");
                None
            }
        };

        let search_tool = |topic| -> Arc<dyn Tool> {
            Arc::new(WebSearchTool::new(
                topic,
                search.clone(),
                config.search_api_key_env.clone(),
            ))
        };

        let toolkit = Toolkit::new()
            .with_tool(Arc::new(PriceHistoryTool::new(prices.clone())))
            .with_tool(Arc::new(TechnicalIndicatorsTool::new(prices)))
            .with_tool(Arc::new(CompanyNewsTool::new(
                news,
                config.finnhub_api_key_env.clone(),
            )))
            .with_tool(search_tool(SearchTopic::SocialSentiment))
            .with_tool(search_tool(SearchTopic::Fundamentals))
            .with_tool(search_tool(SearchTopic::Macroeconomic));

        info!(tools = toolkit.len(), "Toolkit ready");
        Ok(toolkit)
    }
}

fn read_key(env: &str) -> Option<String> {
    std::env::var(env).ok().filter(|v| !v.trim().is_empty())
}
