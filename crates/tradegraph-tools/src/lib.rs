pub mod company_news;
pub mod error;
pub mod indicators;
pub mod price_history;
pub mod sources;
pub mod tool;
pub mod toolkit;
pub mod web_search;

#[cfg(test)]
mod test_fixtures;

pub use company_news::CompanyNewsTool;
pub use error::ToolError;
pub use indicators::TechnicalIndicatorsTool;
pub use price_history::PriceHistoryTool;
pub use sources::market_data::{Bar, PriceSource, YahooPriceSource};
pub use sources::news::{FinnhubNewsSource, NewsItem, NewsSource};
pub use sources::search::{SearchBackend, SearchHit, TavilySearch};
pub use tool::{parse_arguments, Tool, ToolSpec};
pub use toolkit::Toolkit;
pub use web_search::{SearchTopic, WebSearchTool};

/// Tool names handed to each analyst.
pub mod assignments {
    pub const MARKET: &[&str] = &["get_price_history", "get_technical_indicators"];
    pub const SOCIAL: &[&str] = &["get_social_media_sentiment"];
    pub const NEWS: &[&str] = &["get_company_news", "get_macroeconomic_news"];
    pub const FUNDAMENTALS: &[&str] = &["get_fundamental_analysis"];
}
