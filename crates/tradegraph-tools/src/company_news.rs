use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ToolError;
use crate::sources::news::{NewsItem, NewsSource};
use crate::tool::{date_range_schema, parse_arguments, DateRangeArgs, Tool};

const MAX_ITEMS: usize = 5;

pub fn format_news(items: &[NewsItem]) -> String {
    if items.is_empty() {
        return "No news found.".to_string();
    }
    items
        .iter()
        .take(MAX_ITEMS)
        .map(|n| format!("Headline: {}\nSummary: {}", n.headline, n.summary))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// `get_company_news(symbol, start_date, end_date)`: up to five headlines.
pub struct CompanyNewsTool {
    /// `None` when the API key is not configured.
    source: Option<Arc<dyn NewsSource>>,
    key_env: String,
}

impl CompanyNewsTool {
    pub const NAME: &'static str = "get_company_news";

    pub fn new(source: Option<Arc<dyn NewsSource>>, key_env: impl Into<String>) -> Self {
        Self {
            source,
            key_env: key_env.into(),
        }
    }
}

#[async_trait]
impl Tool for CompanyNewsTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Get recent company news headlines and summaries within a date range."
    }

    fn parameters(&self) -> serde_json::Value {
        date_range_schema()
    }

    async fn call(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let args: DateRangeArgs = parse_arguments(Self::NAME, arguments)?;
        let Some(source) = &self.source else {
            return Ok(format!("{} not found.", self.key_env));
        };
        let items = source
            .company_news(&args.symbol, args.start_date, args.end_date)
            .await?;
        Ok(format_news(&items))
    }
}
