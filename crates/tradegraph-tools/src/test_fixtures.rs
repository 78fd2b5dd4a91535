use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;

use crate::error::ToolError;
use crate::sources::market_data::{Bar, PriceSource};

pub struct StaticPriceSource {
    bars: Vec<Bar>,
}

impl StaticPriceSource {
    pub fn new(bars: Vec<Bar>) -> Self {
        Self { bars }
    }
}

#[async_trait]
impl PriceSource for StaticPriceSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn daily_bars(
        &self,
        _symbol: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<Bar>, ToolError> {
        Ok(self.bars.clone())
    }
}

/// `n` consecutive daily bars closing at 100, 101, 102, ...
pub fn rising_bars(n: usize) -> Vec<Bar> {
    let first = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    (0..n)
        .map(|i| {
            let close = Decimal::from(100 + i as i64);
            Bar {
                date: first.checked_add_days(Days::new(i as u64)).unwrap(),
                open: close - Decimal::ONE,
                high: close + Decimal::ONE,
                low: close - Decimal::TWO,
                close,
                volume: 1_000_000 + i as u64,
            }
        })
        .collect()
}
