use serde::Deserialize;
use tradegraph_models::ToolCall;
use uuid::Uuid;

use crate::error::AgentError;
use crate::model::ModelReply;

/// Extract the first JSON object from a string that may contain surrounding text.
///
/// Handles the usual reply shapes:
/// - Clean JSON: `{"key": "value"}`
/// - Markdown-wrapped: ```json\n{"key": "value"}\n```
/// - Prefix text: `I need more data:\n{"key": "value"}`
pub fn extract_json(text: &str) -> Result<String, AgentError> {
    let trimmed = text.trim();

    if trimmed.starts_with('{') && serde_json::from_str::<serde_json::Value>(trimmed).is_ok() {
        return Ok(trimmed.to_string());
    }

    if let Some(json_str) = extract_from_markdown_block(trimmed) {
        if serde_json::from_str::<serde_json::Value>(&json_str).is_ok() {
            return Ok(json_str);
        }
    }

    if let Some(json_str) = extract_first_object(trimmed) {
        if serde_json::from_str::<serde_json::Value>(&json_str).is_ok() {
            return Ok(json_str);
        }
    }

    Err(AgentError::Parse(format!(
        "No valid JSON object found in response (length={})",
        text.len()
    )))
}

fn extract_from_markdown_block(text: &str) -> Option<String> {
    let start_markers = ["```json\n", "```json\r\n", "```\n", "```\r\n"];

    for marker in &start_markers {
        if let Some(start) = text.find(marker) {
            let json_start = start + marker.len();
            if let Some(end) = text[json_start..].find("```") {
                let extracted = text[json_start..json_start + end].trim();
                return Some(extracted.to_string());
            }
        }
    }

    None
}

/// Find the first balanced { ... } in the text.
fn extract_first_object(text: &str) -> Option<String> {
    let mut depth = 0;
    let mut start = None;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in text.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match ch {
            '\\' if in_string => {
                escape_next = true;
            }
            '"' => {
                in_string = !in_string;
            }
            '{' if !in_string => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if !in_string && depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start {
                        return Some(text[s..=i].to_string());
                    }
                }
            }
            _ => {}
        }
    }

    None
}

#[derive(Deserialize)]
struct ToolCallEnvelope {
    tool_calls: Vec<RequestedCall>,
}

#[derive(Deserialize)]
struct RequestedCall {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

pub fn new_call_id() -> String {
    format!("call_{}", Uuid::new_v4().simple())
}

/// Interpret raw model text. When tools were offered and the text carries a
/// `{"tool_calls": [...]}` object, those calls are returned; otherwise the
/// whole text is the reply content.
pub fn parse_model_reply(raw: &str, tools_offered: bool) -> ModelReply {
    let content = raw.trim().to_string();
    if !tools_offered {
        return ModelReply::text(content);
    }

    let envelope = extract_json(&content)
        .ok()
        .and_then(|json| serde_json::from_str::<ToolCallEnvelope>(&json).ok());
    match envelope {
        Some(envelope) if !envelope.tool_calls.is_empty() => ModelReply {
            content: String::new(),
            tool_calls: envelope
                .tool_calls
                .into_iter()
                .map(|call| ToolCall {
                    id: new_call_id(),
                    name: call.name,
                    arguments: call.arguments,
                })
                .collect(),
        },
        _ => ModelReply::text(content),
    }
}
