use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ToolError;
use crate::sources::search::{SearchBackend, SearchHit};
use crate::tool::{parse_arguments, Tool};

/// Which question a web-search tool asks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchTopic {
    SocialSentiment,
    Fundamentals,
    Macroeconomic,
}

impl SearchTopic {
    pub fn tool_name(self) -> &'static str {
        match self {
            SearchTopic::SocialSentiment => "get_social_media_sentiment",
            SearchTopic::Fundamentals => "get_fundamental_analysis",
            SearchTopic::Macroeconomic => "get_macroeconomic_news",
        }
    }

    fn description(self) -> &'static str {
        match self {
            SearchTopic::SocialSentiment => {
                "Performs a live web search for social media sentiment regarding a stock."
            }
            SearchTopic::Fundamentals => {
                "Performs a live web search for recent fundamental analysis of a stock."
            }
            SearchTopic::Macroeconomic => {
                "Performs a live web search for macroeconomic news relevant to the stock market."
            }
        }
    }

    fn query(self, symbol: Option<&str>, trade_date: &str) -> String {
        let symbol = symbol.unwrap_or("the market");
        match self {
            SearchTopic::SocialSentiment => format!(
                "social media sentiment and discussions for {symbol} stock around {trade_date}"
            ),
            SearchTopic::Fundamentals => format!(
                "fundamental analysis and key financial metrics for {symbol} stock published around {trade_date}"
            ),
            SearchTopic::Macroeconomic => format!(
                "macroeconomic news and market trends affecting the stock market on {trade_date}"
            ),
        }
    }

    fn needs_symbol(self) -> bool {
        !matches!(self, SearchTopic::Macroeconomic)
    }
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    symbol: Option<String>,
    trade_date: String,
}

pub fn format_hits(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No search results found.".to_string();
    }
    hits.iter()
        .map(|h| format!("Title: {}\nURL: {}\nContent: {}", h.title, h.url, h.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Web-search tool with a fixed query template per topic. Never fails when
/// the search backend is not configured; it answers with a notice instead.
pub struct WebSearchTool {
    topic: SearchTopic,
    backend: Option<Arc<dyn SearchBackend>>,
    key_env: String,
}

impl WebSearchTool {
    pub fn new(
        topic: SearchTopic,
        backend: Option<Arc<dyn SearchBackend>>,
        key_env: impl Into<String>,
    ) -> Self {
        Self {
            topic,
            backend,
            key_env: key_env.into(),
        }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        self.topic.tool_name()
    }

    fn description(&self) -> &str {
        self.topic.description()
    }

    fn parameters(&self) -> serde_json::Value {
        let mut required = vec!["trade_date"];
        let mut properties = serde_json::json!({
            "trade_date": {"type": "string", "description": "Date in yyyy-mm-dd format"}
        });
        if self.topic.needs_symbol() {
            required.insert(0, "symbol");
            properties["symbol"] =
                serde_json::json!({"type": "string", "description": "ticker symbol of the company"});
        }
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    async fn call(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let args: SearchArgs = parse_arguments(self.name(), arguments)?;
        if self.topic.needs_symbol() && args.symbol.is_none() {
            return Err(ToolError::InvalidArguments {
                tool: self.name().to_string(),
                reason: "missing field `symbol`".to_string(),
            });
        }
        let Some(backend) = &self.backend else {
            return Ok(format!(
                "Search API not configured. Please set {}.",
                self.key_env
            ));
        };
        let query = self.topic.query(args.symbol.as_deref(), &args.trade_date);
        let hits = backend.search(&query).await?;
        Ok(format_hits(&hits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingBackend {
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SearchBackend for RecordingBackend {
        fn name(&self) -> &str {
            "recording"
        }

        async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ToolError> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok(vec![SearchHit {
                title: "Retail traders pile in".to_string(),
                url: "https://example.com/a".to_string(),
                content: "Mostly positive".to_string(),
            }])
        }
    }

    #[tokio::test]
    async fn unconfigured_search_never_fails() {
        let tool = WebSearchTool::new(SearchTopic::SocialSentiment, None, "TAVILY_API_KEY");
        let out = tool
            .call(serde_json::json!({"symbol": "TSLA", "trade_date": "2024-05-01"}))
            .await
            .unwrap();
        assert_eq!(out, "Search API not configured. Please set TAVILY_API_KEY.");
    }

    #[tokio::test]
    async fn query_uses_topic_template() {
        let backend = Arc::new(RecordingBackend {
            queries: Mutex::new(Vec::new()),
        });
        let tool = WebSearchTool::new(
            SearchTopic::Fundamentals,
            Some(backend.clone() as Arc<dyn SearchBackend>),
            "TAVILY_API_KEY",
        );
        let out = tool
            .call(serde_json::json!({"symbol": "TSLA", "trade_date": "2024-05-01"}))
            .await
            .unwrap();

        assert!(out.contains("Title: Retail traders pile in"));
        let queries = backend.queries.lock().unwrap();
        assert_eq!(
            queries[0],
            "fundamental analysis and key financial metrics for TSLA stock published around 2024-05-01"
        );
    }

    #[test]
    fn macro_tool_does_not_require_symbol() {
        let tool = WebSearchTool::new(SearchTopic::Macroeconomic, None, "TAVILY_API_KEY");
        let params = tool.parameters();
        assert_eq!(params["required"], serde_json::json!(["trade_date"]));
        assert_eq!(tool.name(), "get_macroeconomic_news");
    }
}
