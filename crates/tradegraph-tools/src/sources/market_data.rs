use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use crate::error::ToolError;

/// One daily OHLCV bar.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: u64,
}

impl Bar {
    pub fn close_f64(&self) -> f64 {
        self.close.to_f64().unwrap_or(0.0)
    }
}

/// Source of daily price bars.
#[async_trait]
pub trait PriceSource: Send + Sync {
    fn name(&self) -> &str;

    /// Bars with `start <= date < end`, oldest first.
    async fn daily_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>, ToolError>;
}

#[derive(Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Deserialize)]
struct ChartIndicators {
    quote: Vec<ChartQuote>,
}

#[derive(Deserialize)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

/// Daily bars from the Yahoo Finance chart API.
pub struct YahooPriceSource {
    base_url: String,
    client: reqwest::Client,
}

impl YahooPriceSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            base_url: "https://query1.finance.yahoo.com".to_string(),
            client,
        }
    }
}

fn to_price(value: f64) -> Decimal {
    Decimal::from_f64_retain(value)
        .map(|d| d.round_dp(4))
        .unwrap_or_default()
}

fn unix_start_of(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

#[async_trait]
impl PriceSource for YahooPriceSource {
    fn name(&self) -> &str {
        "yahoo"
    }

    async fn daily_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>, ToolError> {
        let symbol = symbol.to_uppercase();
        debug!(%symbol, %start, %end, "Fetching daily bars");

        let resp = self
            .client
            .get(format!("{}/v8/finance/chart/{symbol}", self.base_url))
            .query(&[
                ("period1", unix_start_of(start).to_string()),
                ("period2", unix_start_of(end).to_string()),
                ("interval", "1d".to_string()),
            ])
            .header("User-Agent", "Mozilla/5.0 (tradegraph)")
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ToolError::Upstream {
                service: "yahoo",
                status: resp.status().as_u16(),
            });
        }

        let body: ChartResponse = resp.json().await?;
        if let Some(err) = body.chart.error.filter(|e| !e.is_null()) {
            return Err(ToolError::MarketData(format!("{symbol}: {err}")));
        }
        let Some(result) = body.chart.result.and_then(|r| r.into_iter().next()) else {
            return Ok(Vec::new());
        };
        let Some(quote) = result.indicators.quote.into_iter().next() else {
            return Ok(Vec::new());
        };

        let bars = result
            .timestamp
            .iter()
            .enumerate()
            .filter_map(|(i, ts)| {
                let close = quote.close.get(i).copied().flatten()?;
                let date = DateTime::from_timestamp(*ts, 0)?.date_naive();
                let field = |series: &Vec<Option<f64>>| {
                    to_price(series.get(i).copied().flatten().unwrap_or(close))
                };
                Some(Bar {
                    date,
                    open: field(&quote.open),
                    high: field(&quote.high),
                    low: field(&quote.low),
                    close: to_price(close),
                    volume: quote.volume.get(i).copied().flatten().unwrap_or(0),
                })
            })
            .filter(|bar| bar.date >= start && bar.date < end)
            .collect();

        Ok(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn chart_payload_parses_with_gaps() {
        let json = r#"{
            "chart": {
                "result": [{
                    "timestamp": [1704205800, 1704292200],
                    "indicators": {"quote": [{
                        "open": [187.15, null],
                        "high": [188.44, null],
                        "low": [183.89, null],
                        "close": [185.64, null],
                        "volume": [82488700, null]
                    }]}
                }],
                "error": null
            }
        }"#;
        let body: ChartResponse = serde_json::from_str(json).unwrap();
        let result = body.chart.result.unwrap();
        assert_eq!(result[0].timestamp.len(), 2);
        assert_eq!(result[0].indicators.quote[0].close[1], None);
    }

    #[test]
    fn prices_are_rounded() {
        assert_eq!(to_price(185.640000001), dec!(185.64));
    }
}
