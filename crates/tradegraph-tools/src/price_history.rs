use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ToolError;
use crate::sources::market_data::{Bar, PriceSource};
use crate::tool::{date_range_schema, parse_arguments, DateRangeArgs, Tool};

/// Rows shown from each end of a long history.
const EDGE_ROWS: usize = 25;
const MAX_FULL_ROWS: usize = 50;

const CSV_HEADER: &str = "Date,Open,High,Low,Close,Volume";

fn bar_to_csv(bar: &Bar) -> String {
    format!(
        "{},{},{},{},{},{}",
        bar.date, bar.open, bar.high, bar.low, bar.close, bar.volume
    )
}

fn rows_to_csv(bars: &[Bar]) -> String {
    let mut out = String::from(CSV_HEADER);
    for bar in bars {
        out.push('\n');
        out.push_str(&bar_to_csv(bar));
    }
    out
}

/// Render bars as CSV, keeping only the first and last 25 rows beyond 50.
pub fn format_price_history(bars: &[Bar]) -> String {
    if bars.len() > MAX_FULL_ROWS {
        let head = rows_to_csv(&bars[..EDGE_ROWS]);
        let tail = rows_to_csv(&bars[bars.len() - EDGE_ROWS..]);
        return format!(
            "Data truncated. Showing first {EDGE_ROWS} and last {EDGE_ROWS} rows:\n{head}\n...\n{tail}"
        );
    }
    rows_to_csv(bars)
}

/// `get_price_history(symbol, start_date, end_date)`.
pub struct PriceHistoryTool {
    source: Arc<dyn PriceSource>,
}

impl PriceHistoryTool {
    pub const NAME: &'static str = "get_price_history";

    pub fn new(source: Arc<dyn PriceSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Tool for PriceHistoryTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Retrieve daily price data (OHLCV) for a ticker symbol between two dates."
    }

    fn parameters(&self) -> serde_json::Value {
        date_range_schema()
    }

    async fn call(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let args: DateRangeArgs = parse_arguments(Self::NAME, arguments)?;
        let bars = self
            .source
            .daily_bars(&args.symbol, args.start_date, args.end_date)
            .await?;
        if bars.is_empty() {
            return Ok(format!(
                "No data found for symbol '{}' between {} and {}",
                args.symbol, args.start_date, args.end_date
            ));
        }
        Ok(format_price_history(&bars))
    }
}
