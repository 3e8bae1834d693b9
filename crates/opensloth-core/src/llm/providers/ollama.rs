use super::OpenAiProvider;
use crate::llm::http_utils::{join_url, send_json_request};
use crate::llm::{
    generate_call_id, parse_tool_arguments, LlmError, LlmProvider, LlmResponse, Message, ToolCall,
    ToolDefinition,
};
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde_json::{json, Value};
use tracing::debug;

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

#[derive(serde::Deserialize, Debug)]
struct OllamaFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(serde::Deserialize, Debug)]
struct OllamaToolCall {
    function: OllamaFunction,
}

#[derive(serde::Deserialize, Debug)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Vec<OllamaToolCall>,
}

#[derive(serde::Deserialize, Debug)]
struct OllamaResponse {
    message: OllamaMessage,
    done_reason: Option<String>,
}

/// LLM provider implementation for a local Ollama server
pub struct OllamaProvider {
    http_client: HttpClient,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl OllamaProvider {
    /// Create a new Ollama provider instance
    ///
    /// The API key is optional and only sent when an authenticating proxy sits in front of Ollama.
    #[must_use]
    pub fn new(
        http_client: HttpClient,
        api_key: Option<String>,
        model: String,
        base_url: Option<String>,
    ) -> Self {
        Self {
            http_client,
            api_key,
            model,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }

    fn prepare_messages(system_prompt: &str, history: &[Message]) -> Vec<Value> {
        let mut messages = vec![json!({"role": "system", "content": system_prompt})];

        for msg in history {
            match (msg.role.as_str(), &msg.tool_calls) {
                ("assistant", Some(calls)) => {
                    let tool_calls: Vec<Value> = calls
                        .iter()
                        .map(|tc| {
                            json!({
                                "function": {"name": tc.name, "arguments": tc.arguments}
                            })
                        })
                        .collect();
                    messages.push(json!({
                        "role": "assistant",
                        "content": msg.content,
                        "tool_calls": tool_calls
                    }));
                }
                ("tool", _) => {
                    messages.push(json!({
                        "role": "tool",
                        "tool_name": msg.name,
                        "content": msg.content
                    }));
                }
                (role, _) => {
                    messages.push(json!({"role": role, "content": msg.content}));
                }
            }
        }
        messages
    }

    fn parse_response(res_json: Value) -> Result<LlmResponse, LlmError> {
        let parsed: OllamaResponse =
            serde_json::from_value(res_json).map_err(|e| LlmError::JsonError(e.to_string()))?;

        debug!(
            done_reason = parsed.done_reason.as_deref().unwrap_or("unknown"),
            "Ollama response received"
        );

        let tool_calls = parsed
            .message
            .tool_calls
            .into_iter()
            .map(|tc| {
                // Arguments arrive as an object, older builds send a JSON string
                let arguments = match tc.function.arguments {
                    Value::String(raw) => parse_tool_arguments(&raw),
                    Value::Null => json!({}),
                    other => other,
                };
                ToolCall::new(generate_call_id(), tc.function.name, arguments)
            })
            .collect();

        Ok(LlmResponse::from_parts(Some(parsed.message.content), tool_calls))
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &'static str {
        "ollama"
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
        let url = join_url(&self.base_url, "api/chat");

        let mut body = json!({
            "model": self.model,
            "messages": Self::prepare_messages(system_prompt, messages),
            "stream": false
        });
        if !tools.is_empty() {
            body["tools"] = json!(OpenAiProvider::prepare_tools(tools));
        }

        let auth_header = self.api_key.as_ref().map(|key| format!("Bearer {key}"));
        let res_json = send_json_request(
            &self.http_client,
            &url,
            &body,
            auth_header.as_deref(),
            &[],
        )
        .await?;

        Self::parse_response(res_json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arguments_as_object_or_string() {
        let payload = json!({
            "done_reason": "stop",
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [
                    {"function": {"name": "update_cell", "arguments": {"row": 1, "column": "Status", "value": "Done"}}},
                    {"function": {"name": "search", "arguments": "{\"query\":\"Bob\"}"}}
                ]
            }
        });

        let Ok(LlmResponse::ToolCalls(calls)) = OllamaProvider::parse_response(payload) else {
            panic!("expected tool calls");
        };
        assert_eq!(calls[0].arguments["column"], "Status");
        assert_eq!(calls[1].arguments, json!({"query": "Bob"}));
        assert!(calls.iter().all(|c| c.id.starts_with("call_")));
    }

    #[test]
    fn test_tool_results_carry_tool_name() {
        let history = vec![
            Message::user("hi"),
            Message::assistant_with_tools("", vec![ToolCall::new("x", "list_sheets", json!({}))]),
            Message::tool("x", "list_sheets", "[]"),
        ];
        let messages = OllamaProvider::prepare_messages("sys", &history);
        assert_eq!(messages[2]["tool_calls"][0]["function"]["arguments"], json!({}));
        assert_eq!(messages[3]["tool_name"], "list_sheets");
    }

    #[test]
    fn test_plain_reply() {
        let payload = json!({"message": {"role": "assistant", "content": "Hello"}, "done": true});
        assert_eq!(
            OllamaProvider::parse_response(payload).ok(),
            Some(LlmResponse::FinalMessage("Hello".to_string()))
        );
    }
}
