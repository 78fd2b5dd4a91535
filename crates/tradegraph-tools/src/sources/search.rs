use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::ToolError;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SearchHit {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
}

/// Free-text web search backend.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ToolError>;
}

#[derive(Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

/// Tavily search API.
pub struct TavilySearch {
    api_key: String,
    max_results: usize,
    base_url: String,
    client: reqwest::Client,
}

impl TavilySearch {
    pub fn new(api_key: String, client: reqwest::Client) -> Self {
        Self {
            api_key,
            max_results: 3,
            base_url: "https://api.tavily.com".to_string(),
            client,
        }
    }
}

#[async_trait]
impl SearchBackend for TavilySearch {
    fn name(&self) -> &str {
        "tavily"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ToolError> {
        debug!(query, "Running web search");
        let resp = self
            .client
            .post(format!("{}/search", self.base_url))
            .json(&serde_json::json!({
                "api_key": self.api_key,
                "query": query,
                "max_results": self.max_results,
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ToolError::Upstream {
                service: "tavily",
                status: resp.status().as_u16(),
            });
        }
        Ok(resp.json::<TavilyResponse>().await?.results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tavily_payload_parses() {
        let body: TavilyResponse = serde_json::from_str(
            r#"{"query": "q", "results": [{"title": "T", "url": "https://x", "content": "C", "score": 0.9}]}"#,
        )
        .unwrap();
        assert_eq!(body.results.len(), 1);
        assert_eq!(body.results[0].content, "C");
    }
}
