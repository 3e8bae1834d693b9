use crate::llm::http_utils::{join_url, send_json_request};
use crate::llm::{LlmError, LlmProvider, LlmResponse, Message, ToolCall, ToolDefinition};
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde_json::{json, Value};
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(serde::Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Other,
}

#[derive(serde::Deserialize, Debug)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
}

/// LLM provider implementation for the Anthropic Messages API
pub struct AnthropicProvider {
    http_client: HttpClient,
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider instance
    #[must_use]
    pub fn new(
        http_client: HttpClient,
        api_key: String,
        model: String,
        base_url: Option<String>,
        max_tokens: u32,
    ) -> Self {
        Self {
            http_client,
            api_key,
            model,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            max_tokens,
        }
    }

    /// Convert the transcript to content-block messages.
    ///
    /// Tool results travel as `tool_result` blocks in a user turn. Consecutive
    /// turns with the same role are merged, and the transcript must open with
    /// a user turn.
    pub(crate) fn prepare_messages(history: &[Message]) -> Vec<Value> {
        let mut api_messages: Vec<Value> = Vec::new();

        for msg in history {
            let (role, blocks) = match msg.role.as_str() {
                "tool" => (
                    "user",
                    vec![json!({
                        "type": "tool_result",
                        "tool_use_id": msg.tool_call_id,
                        "content": msg.content
                    })],
                ),
                "assistant" => {
                    let mut blocks = Vec::new();
                    if !msg.content.trim().is_empty() {
                        blocks.push(json!({"type": "text", "text": msg.content}));
                    }
                    for call in msg.tool_calls.iter().flatten() {
                        let input = if call.arguments.is_object() {
                            call.arguments.clone()
                        } else {
                            json!({})
                        };
                        blocks.push(json!({
                            "type": "tool_use",
                            "id": call.id,
                            "name": call.name,
                            "input": input
                        }));
                    }
                    ("assistant", blocks)
                }
                _ => {
                    if msg.content.trim().is_empty() {
                        continue;
                    }
                    ("user", vec![json!({"type": "text", "text": msg.content})])
                }
            };

            if blocks.is_empty() || (api_messages.is_empty() && role != "user") {
                continue;
            }

            match api_messages.last_mut() {
                Some(last) if last["role"] == role => {
                    if let Some(content) = last["content"].as_array_mut() {
                        content.extend(blocks);
                    }
                }
                _ => api_messages.push(json!({"role": role, "content": blocks})),
            }
        }

        api_messages
    }

    fn prepare_tools(tools: &[ToolDefinition]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "input_schema": t.parameters
                })
            })
            .collect()
    }

    fn parse_response(res_json: Value) -> Result<LlmResponse, LlmError> {
        let parsed: MessagesResponse =
            serde_json::from_value(res_json).map_err(|e| LlmError::JsonError(e.to_string()))?;

        debug!(
            stop_reason = parsed.stop_reason.as_deref().unwrap_or("unknown"),
            "Anthropic response received"
        );

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        for block in parsed.content {
            match block {
                ContentBlock::Text { text: t } => text.push_str(&t),
                ContentBlock::ToolUse { id, name, input } => {
                    let arguments = if input.is_null() { json!({}) } else { input };
                    tool_calls.push(ToolCall::new(id, name, arguments));
                }
                ContentBlock::Other => {}
            }
        }

        Ok(LlmResponse::from_parts(Some(text), tool_calls))
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn model(&self) -> String {
        self.model.clone()
    }

    async fn generate(
        &self,
        system_prompt: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<LlmResponse, LlmError> {
        let url = join_url(&self.base_url, "v1/messages");

        let mut body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "system": system_prompt,
            "messages": Self::prepare_messages(messages),
        });
        if !tools.is_empty() {
            body["tools"] = json!(Self::prepare_tools(tools));
        }

        let res_json = send_json_request(
            &self.http_client,
            &url,
            &body,
            None,
            &[
                ("x-api-key", self.api_key.as_str()),
                ("anthropic-version", ANTHROPIC_VERSION),
            ],
        )
        .await?;

        Self::parse_response(res_json)
    }
}
