use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;

/// Declaration of a tool as presented to the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters: serde_json::Value,
}

/// A data-retrieval collaborator callable by analyst nodes.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> serde_json::Value;

    async fn call(&self, arguments: serde_json::Value) -> Result<String, ToolError>;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Deserialize a tool's arguments object, naming the tool on failure.
pub fn parse_arguments<T: DeserializeOwned>(
    tool: &str,
    arguments: serde_json::Value,
) -> Result<T, ToolError> {
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments {
        tool: tool.to_string(),
        reason: e.to_string(),
    })
}

/// Schema for the `(symbol, start_date, end_date)` argument triple.
pub(crate) fn date_range_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "symbol": {"type": "string", "description": "ticker symbol of the company"},
            "start_date": {"type": "string", "description": "Start date in yyyy-mm-dd format"},
            "end_date": {"type": "string", "description": "End date in yyyy-mm-dd format"}
        },
        "required": ["symbol", "start_date", "end_date"]
    })
}

#[derive(Debug, Deserialize)]
pub(crate) struct DateRangeArgs {
    pub symbol: String,
    pub start_date: chrono::NaiveDate,
    pub end_date: chrono::NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_range() {
        let args: DateRangeArgs = parse_arguments(
            "get_price_history",
            serde_json::json!({"symbol": "AAPL", "start_date": "2024-01-01", "end_date": "2024-02-01"}),
        )
        .unwrap();
        assert_eq!(args.symbol, "AAPL");
        assert!(args.start_date < args.end_date);
    }

    #[test]
    fn bad_arguments_name_the_tool() {
        let err = parse_arguments::<DateRangeArgs>(
            "get_price_history",
            serde_json::json!({"symbol": "AAPL", "start_date": "yesterday"}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("get_price_history"));
    }
}
