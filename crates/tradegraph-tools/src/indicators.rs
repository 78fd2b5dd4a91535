//! Technical indicators computed locally from daily closes.
//!
//! Series are aligned with the input; warm-up positions are `None`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ToolError;
use crate::sources::market_data::{Bar, PriceSource};
use crate::tool::{date_range_schema, parse_arguments, DateRangeArgs, Tool};

const TAIL_ROWS: usize = 5;

pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }
    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;
    for (i, v) in values.iter().enumerate() {
        sum += v;
        if i >= period {
            sum -= values[i - period];
        }
        out.push((i + 1 >= period).then(|| sum / period as f64));
    }
    out
}

/// Exponential moving average seeded with the first value.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut prev: Option<f64> = None;
    for v in values {
        let next = match prev {
            Some(p) => alpha * v + (1.0 - alpha) * p,
            None => *v,
        };
        out.push(next);
        prev = Some(next);
    }
    out
}

/// MACD line: EMA(12) - EMA(26).
pub fn macd(values: &[f64]) -> Vec<f64> {
    let fast = ema(values, 12);
    let slow = ema(values, 26);
    fast.iter().zip(slow.iter()).map(|(f, s)| f - s).collect()
}

/// Relative strength index with Wilder smoothing.
pub fn rsi(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() <= period {
        return out;
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..=period {
        let change = values[i] - values[i - 1];
        avg_gain += change.max(0.0);
        avg_loss += (-change).max(0.0);
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;
    out[period] = Some(rsi_value(avg_gain, avg_loss));

    for i in period + 1..values.len() {
        let change = values[i] - values[i - 1];
        avg_gain = (avg_gain * (period as f64 - 1.0) + change.max(0.0)) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + (-change).max(0.0)) / period as f64;
        out[i] = Some(rsi_value(avg_gain, avg_loss));
    }
    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            50.0
        } else {
            100.0
        }
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

/// Bollinger bands `(middle, upper, lower)` using the sample standard deviation.
pub fn bollinger(
    values: &[f64],
    period: usize,
    width: f64,
) -> Vec<Option<(f64, f64, f64)>> {
    let middle = sma(values, period);
    middle
        .iter()
        .enumerate()
        .map(|(i, mid)| {
            let mid = (*mid)?;
            if period < 2 {
                return Some((mid, mid, mid));
            }
            let window = &values[i + 1 - period..=i];
            let var = window.iter().map(|v| (v - mid).powi(2)).sum::<f64>() / (period as f64 - 1.0);
            let band = width * var.sqrt();
            Some((mid, mid + band, mid - band))
        })
        .collect()
}

fn cell(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.4}")).unwrap_or_default()
}

/// CSV of the last five rows of MACD, RSI(14), Bollinger(20, 2), SMA(50) and SMA(200).
pub fn format_indicators(bars: &[Bar]) -> String {
    let closes: Vec<f64> = bars.iter().map(Bar::close_f64).collect();
    let macd = macd(&closes);
    let rsi = rsi(&closes, 14);
    let boll = bollinger(&closes, 20, 2.0);
    let sma50 = sma(&closes, 50);
    let sma200 = sma(&closes, 200);

    let mut out =
        String::from("Date,close,macd,rsi_14,boll,boll_ub,boll_lb,close_50_sma,close_200_sma");
    let start = bars.len().saturating_sub(TAIL_ROWS);
    for i in start..bars.len() {
        let (mid, ub, lb) = match boll[i] {
            Some((m, u, l)) => (Some(m), Some(u), Some(l)),
            None => (None, None, None),
        };
        out.push_str(&format!(
            "\n{},{},{},{},{},{},{},{},{}",
            bars[i].date,
            bars[i].close,
            cell(Some(macd[i])),
            cell(rsi[i]),
            cell(mid),
            cell(ub),
            cell(lb),
            cell(sma50[i]),
            cell(sma200[i]),
        ));
    }
    out
}

/// `get_technical_indicators(symbol, start_date, end_date)`.
pub struct TechnicalIndicatorsTool {
    source: Arc<dyn PriceSource>,
}

impl TechnicalIndicatorsTool {
    pub const NAME: &'static str = "get_technical_indicators";

    pub fn new(source: Arc<dyn PriceSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Tool for TechnicalIndicatorsTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Retrieve key technical indicators (MACD, RSI, Bollinger bands, 50/200-day SMA) for a stock."
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
            return Ok("No data to calculate indicators.".to_string());
        }
        Ok(format_indicators(&bars))
    }
}
