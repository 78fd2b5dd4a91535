use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};
use tradegraph_models::Message;
use tradegraph_tools::ToolSpec;

use crate::error::AgentError;
use crate::model::{ChatModel, ModelReply, ModelRequest};
use crate::parser::parse_model_reply;

/// Configuration for a Claude CLI invocation.
#[derive(Debug, Clone)]
pub struct ClaudeCliConfig {
    pub model: String,
    pub timeout: Duration,
}

impl Default for ClaudeCliConfig {
    fn default() -> Self {
        Self {
            model: "claude-3-5-haiku-latest".to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Invoke the `claude` CLI with a system prompt and user prompt.
/// Returns the raw stdout text.
pub async fn invoke_claude(
    system_prompt: &str,
    user_prompt: &str,
    config: &ClaudeCliConfig,
) -> Result<String, AgentError> {
    debug!(
        model = %config.model,
        system_chars = system_prompt.len(),
        prompt_chars = user_prompt.len(),
        "Invoking claude CLI"
    );

    let result = tokio::time::timeout(config.timeout, async {
        Command::new("claude")
            .args([
                "-p",
                user_prompt,
                "--system-prompt",
                system_prompt,
                "--model",
                &config.model,
                "--output-format",
                "text",
            ])
            .kill_on_drop(true)
            .output()
            .await
    })
    .await
    .map_err(|_| AgentError::Timeout(config.timeout.as_secs()))?
    .map_err(|e| AgentError::Cli(format!("Failed to spawn claude: {e}")))?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        warn!(status = %result.status, stderr = %stderr, "Claude CLI failed");
        return Err(AgentError::Cli(format!(
            "claude exited {}: {}",
            result.status, stderr
        )));
    }

    let stdout = String::from_utf8_lossy(&result.stdout).to_string();
    if stdout.trim().is_empty() {
        return Err(AgentError::Cli(
            "Claude returned empty response".to_string(),
        ));
    }

    Ok(stdout)
}

/// Check if the `claude` CLI is available on the system.
pub async fn check_cli_available() -> bool {
    match Command::new("claude").arg("--version").output().await {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}

/// Production [`ChatModel`] backed by the `claude` CLI.
///
/// The CLI has no native tool-calling, so bound tools are described in the
/// system prompt and the model answers with a `{"tool_calls": [...]}` object
/// when it wants data.
pub struct ClaudeCliModel {
    config: ClaudeCliConfig,
}

impl ClaudeCliModel {
    pub fn new(model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            config: ClaudeCliConfig {
                model: model.into(),
                timeout,
            },
        }
    }
}

#[async_trait]
impl ChatModel for ClaudeCliModel {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn invoke(&self, request: &ModelRequest) -> Result<ModelReply, AgentError> {
        let system = system_prompt(request.system.as_deref(), &request.tools);
        let transcript = render_transcript(&request.messages);
        let raw = invoke_claude(&system, &transcript, &self.config).await?;
        Ok(parse_model_reply(&raw, !request.tools.is_empty()))
    }
}

fn system_prompt(system: Option<&str>, tools: &[ToolSpec]) -> String {
    let mut out = system.unwrap_or("You are a helpful financial analyst.").to_string();
    if tools.is_empty() {
        return out;
    }

    out.push_str("\n\n## TOOLS\n\nYou can request data with these tools:\n");
    for tool in tools {
        out.push_str(&format!(
            "- `{}`: {} Arguments schema: {}\n",
            tool.name, tool.description, tool.parameters
        ));
    }
    out.push_str(
        "\nTo call tools, reply with ONLY a JSON object of the form \
         {\"tool_calls\": [{\"name\": \"<tool>\", \"arguments\": {...}}]} and nothing else. \
         Tool results will be returned in the conversation. When you have enough data, \
         reply with your final report as plain text without any tool_calls object.",
    );
    out
}

/// Flatten the conversation into the single prompt the CLI accepts.
fn render_transcript(messages: &[Message]) -> String {
    let mut out = String::new();
    for message in messages {
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        match message {
            Message::Human { content } => {
                out.push_str("User: ");
                out.push_str(content);
            }
            Message::Agent {
                content,
                tool_calls,
            } => {
                out.push_str("Assistant: ");
                out.push_str(content);
                for call in tool_calls {
                    out.push_str(&format!(
                        "\n[requested {} with {} as {}]",
                        call.name, call.arguments, call.id
                    ));
                }
            }
            Message::Tool {
                tool_call_id,
                name,
                content,
            } => {
                out.push_str(&format!("Tool result from {name} ({tool_call_id}):\n{content}"));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tradegraph_models::ToolCall;

    #[test]
    fn default_config() {
        let config = ClaudeCliConfig::default();
        assert_eq!(config.model, "claude-3-5-haiku-latest");
        assert_eq!(config.timeout, Duration::from_secs(120));
    }

    #[test]
    fn tools_are_described_in_system_prompt() {
        let tools = vec![ToolSpec {
            name: "get_price_history".to_string(),
            description: "Daily bars.".to_string(),
            parameters: serde_json::json!({"type": "object"}),
        }];
        let prompt = system_prompt(Some("You are a market analyst."), &tools);
        assert!(prompt.starts_with("You are a market analyst."));
        assert!(prompt.contains("`get_price_history`"));
        assert!(prompt.contains("\"tool_calls\""));

        assert_eq!(system_prompt(Some("plain"), &[]), "plain");
    }

    #[test]
    fn transcript_keeps_order_and_call_ids() {
        let messages = vec![
            Message::human("Analyze AAPL"),
            Message::agent_with_calls(
                "",
                vec![ToolCall {
                    id: "call_1".to_string(),
                    name: "get_price_history".to_string(),
                    arguments: serde_json::json!({"symbol": "AAPL"}),
                }],
            ),
            Message::tool_result("call_1", "get_price_history", "Date,Open"),
        ];
        let text = render_transcript(&messages);
        let user = text.find("User: Analyze AAPL").unwrap();
        let call = text.find("as call_1]").unwrap();
        let result = text.find("Tool result from get_price_history (call_1)").unwrap();
        assert!(user < call && call < result);
    }
}
