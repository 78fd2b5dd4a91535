use serde::{Deserialize, Serialize};

use crate::state::StateUpdate;

/// One line of the run's progress stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum StreamEvent {
    /// A node finished and produced this partial state.
    Update { node: String, data: StateUpdate },
    /// The rate limiter is holding back the next model call.
    RateLimit {
        sleep_seconds: f64,
        request_number: u64,
    },
    Complete,
    Error { error: String },
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Complete | StreamEvent::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ReportKind, Reports};

    #[test]
    fn wire_shapes() {
        let update = StreamEvent::Update {
            node: "Market Analyst".to_string(),
            data: StateUpdate {
                reports: Reports::only(ReportKind::Market, "M"),
                ..Default::default()
            },
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["type"], "update");
        assert_eq!(json["node"], "Market Analyst");
        assert_eq!(json["data"]["market_report"], "M");

        let rate = serde_json::to_value(StreamEvent::RateLimit {
            sleep_seconds: 2.5,
            request_number: 7,
        })
        .unwrap();
        assert_eq!(rate["type"], "rate_limit");
        assert_eq!(rate["sleepSeconds"], 2.5);
        assert_eq!(rate["requestNumber"], 7);

        let complete = serde_json::to_string(&StreamEvent::Complete).unwrap();
        assert_eq!(complete, r#"{"type":"complete"}"#);

        let error = serde_json::to_value(StreamEvent::Error {
            error: "boom".to_string(),
        })
        .unwrap();
        assert_eq!(error["error"], "boom");
    }

    #[test]
    fn terminal_events() {
        assert!(StreamEvent::Complete.is_terminal());
        assert!(!StreamEvent::RateLimit {
            sleep_seconds: 1.0,
            request_number: 1
        }
        .is_terminal());
    }
}
