//! Bounds the message history an analyst sends to its model.
//!
//! Finalized reports stay (truncated past [`MAX_CONTENT_CHARS`]); tool traffic
//! survives only while it belongs to the unfinished tool sequence, i.e. when
//! no report follows it. Human messages are always kept.

use tracing::debug;
use tradegraph_models::Message;

pub const MAX_CONTENT_CHARS: usize = 2000;
pub const TRUNCATION_MARKER: &str = "\n\n[... Report truncated for brevity ...]";

/// First `MAX_CONTENT_CHARS` characters plus the marker, or the content unchanged.
pub fn truncate_content(content: &str) -> String {
    match content.char_indices().nth(MAX_CONTENT_CHARS) {
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &content[..cut]),
        None => content.to_string(),
    }
}

pub fn compact_messages(messages: &[Message]) -> Vec<Message> {
    let last_report = messages.iter().rposition(Message::is_report);

    let compacted: Vec<Message> = messages
        .iter()
        .enumerate()
        .filter_map(|(i, message)| match message {
            Message::Human { .. } => Some(message.clone()),
            Message::Agent { content, .. } if message.is_report() => {
                Some(Message::agent(truncate_content(content)))
            }
            // Tool traffic followed by a report belongs to a finished phase
            _ if last_report.is_some_and(|r| r > i) => None,
            Message::Tool {
                tool_call_id,
                name,
                content,
            } => Some(Message::tool_result(
                tool_call_id.clone(),
                name.clone(),
                truncate_content(content),
            )),
            _ => Some(message.clone()),
        })
        .collect();

    debug!(
        before = messages.len(),
        after = compacted.len(),
        "Compacted message history"
    );
    compacted
}
