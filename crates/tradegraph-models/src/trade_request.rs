use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Starts a workflow run for one instrument.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TradeRequest {
    /// Ticker symbol of the instrument under analysis.
    pub subject: String,
    pub as_of_date: NaiveDate,
}

impl TradeRequest {
    pub fn new(subject: impl Into<String>, as_of_date: NaiveDate) -> Self {
        Self {
            subject: subject.into().trim().to_uppercase(),
            as_of_date,
        }
    }
}
