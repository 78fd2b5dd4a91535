use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::debug;

use crate::error::ToolError;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct NewsItem {
    pub headline: String,
    #[serde(default)]
    pub summary: String,
}

/// Source of company news headlines.
#[async_trait]
pub trait NewsSource: Send + Sync {
    fn name(&self) -> &str;

    async fn company_news(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<NewsItem>, ToolError>;
}

/// Finnhub `company-news` endpoint.
pub struct FinnhubNewsSource {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl FinnhubNewsSource {
    pub fn new(api_key: String, client: reqwest::Client) -> Self {
        Self {
            api_key,
            base_url: "https://finnhub.io/api/v1".to_string(),
            client,
        }
    }
}

#[async_trait]
impl NewsSource for FinnhubNewsSource {
    fn name(&self) -> &str {
        "finnhub"
    }

    async fn company_news(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<NewsItem>, ToolError> {
        debug!(symbol, %from, %to, "Fetching company news");
        let resp = self
            .client
            .get(format!("{}/company-news", self.base_url))
            .query(&[
                ("symbol", symbol.to_uppercase()),
                ("from", from.to_string()),
                ("to", to.to_string()),
                ("token", self.api_key.clone()),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ToolError::Upstream {
                service: "finnhub",
                status: resp.status().as_u16(),
            });
        }
        Ok(resp.json::<Vec<NewsItem>>().await?)
    }
}
