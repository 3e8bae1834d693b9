use crate::llm::http_utils::{join_url, send_json_request};
use crate::llm::{
    generate_call_id, parse_tool_arguments, LlmError, LlmProvider, LlmResponse, Message, ToolCall,
    ToolDefinition,
};
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde_json::{json, Value};
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(serde::Deserialize, Debug)]
struct LenientToolCallFunction {
    name: String,
    // Some OpenAI-compatible servers send an object instead of a string
    #[serde(default)]
    arguments: Value,
}

#[derive(serde::Deserialize, Debug)]
struct LenientToolCall {
    id: Option<String>,
    function: LenientToolCallFunction,
}

#[derive(serde::Deserialize, Debug)]
struct LenientMessage {
    content: Option<String>,
    tool_calls: Option<Vec<LenientToolCall>>,
}

#[derive(serde::Deserialize, Debug)]
struct LenientChoice {
    message: LenientMessage,
    finish_reason: Option<String>,
}

#[derive(serde::Deserialize, Debug)]
struct LenientResponse {
    choices: Vec<LenientChoice>,
}

/// LLM provider implementation for `OpenAI` chat completions
pub struct OpenAiProvider {
    http_client: HttpClient,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiProvider {
    /// Create a new `OpenAI` provider instance
    #[must_use]
    pub fn new(
        http_client: HttpClient,
        api_key: String,
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

    pub(crate) fn prepare_messages(system_prompt: &str, history: &[Message]) -> Vec<Value> {
        let mut messages = vec![json!({
            "role": "system",
            "content": system_prompt
        })];

        for msg in history {
            match msg.role.as_str() {
                "tool" => {
                    messages.push(json!({
                        "role": "tool",
                        "tool_call_id": msg.tool_call_id,
                        "content": msg.content
                    }));
                }
                "assistant" => {
                    let mut m = json!({
                        "role": "assistant",
                        "content": msg.content
                    });

                    if let Some(tool_calls) = &msg.tool_calls {
                        let api_tool_calls: Vec<Value> = tool_calls
                            .iter()
                            .map(|tc| {
                                json!({
                                    "id": tc.id,
                                    "type": "function",
                                    "function": {
                                        "name": tc.name,
                                        "arguments": tc.arguments_json()
                                    }
                                })
                            })
                            .collect();

                        m["tool_calls"] = json!(api_tool_calls);
                    }

                    messages.push(m);
                }
                _ => {
                    messages.push(json!({
                        "role": msg.role,
                        "content": msg.content
                    }));
                }
            }
        }
        messages
    }

    pub(crate) fn prepare_tools(tools: &[ToolDefinition]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters
                    }
                })
            })
            .collect()
    }

    fn parse_response(res_json: Value) -> Result<LlmResponse, LlmError> {
        let parsed: LenientResponse =
            serde_json::from_value(res_json).map_err(|e| LlmError::JsonError(e.to_string()))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::ApiError("Empty response".to_string()))?;

        debug!(
            finish_reason = choice.finish_reason.as_deref().unwrap_or("unknown"),
            "OpenAI response received"
        );

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| {
                let arguments = match tc.function.arguments {
                    Value::String(raw) => parse_tool_arguments(&raw),
                    Value::Null => json!({}),
                    other => other,
                };
                ToolCall::new(
                    tc.id.unwrap_or_else(generate_call_id),
                    tc.function.name,
                    arguments,
                )
            })
            .collect();

        Ok(LlmResponse::from_parts(choice.message.content, tool_calls))
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn model(&self) -> String {
        self.model.clone()
    }

    /// Chat completion with function calling
    ///
    /// # Errors
    ///
    /// Returns `LlmError::NetworkError` on connectivity issues, `LlmError::ApiError` on non-success status codes,
    /// or `LlmError::JsonError` if parsing fails.
    async fn generate(
        &self,
        system_prompt: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<LlmResponse, LlmError> {
        let url = join_url(&self.base_url, "chat/completions");

        let mut body = json!({
            "model": self.model,
            "messages": Self::prepare_messages(system_prompt, messages),
        });
        if !tools.is_empty() {
            body["tools"] = json!(Self::prepare_tools(tools));
            body["tool_choice"] = json!("auto");
        }

        let auth_header = format!("Bearer {}", self.api_key);
        let res_json =
            send_json_request(&self.http_client, &url, &body, Some(&auth_header), &[]).await?;

        Self::parse_response(res_json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_messages_echoes_tool_calls() {
        let history = vec![
            Message::user("add Bob"),
            Message::assistant_with_tools(
                "",
                vec![ToolCall::new("call_1", "add_row", json!({"data": {"Name": "Bob"}}))],
            ),
            Message::tool("call_1", "add_row", r#"{"success":true}"#),
        ];

        let messages = OpenAiProvider::prepare_messages("system", &history);

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[2]["tool_calls"][0]["id"], "call_1");
        assert_eq!(
            messages[2]["tool_calls"][0]["function"]["arguments"],
            r#"{"data":{"Name":"Bob"}}"#
        );
        assert_eq!(messages[3]["role"], "tool");
        assert_eq!(messages[3]["tool_call_id"], "call_1");
    }

    #[test]
    fn test_parse_tool_calls_in_order() {
        let payload = json!({
            "choices": [{
                "finish_reason": "tool_calls",
                "message": {
                    "content": null,
                    "tool_calls": [
                        {"id": "a", "type": "function", "function": {"name": "read_sheet", "arguments": "{}"}},
                        {"id": "b", "function": {"name": "delete_row", "arguments": "{\"row\": 2}"}}
                    ]
                }
            }]
        });

        let response = OpenAiProvider::parse_response(payload).ok();
        let Some(LlmResponse::ToolCalls(calls)) = response else {
            panic!("expected tool calls");
        };
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "read_sheet");
        assert_eq!(calls[1].id, "b");
        assert_eq!(calls[1].arguments, json!({"row": 2}));
    }

    #[test]
    fn test_parse_final_message() {
        let payload = json!({
            "choices": [{"message": {"content": "All done"}, "finish_reason": "stop"}]
        });
        assert_eq!(
            OpenAiProvider::parse_response(payload).ok(),
            Some(LlmResponse::FinalMessage("All done".to_string()))
        );
    }

    #[test]
    fn test_empty_choices_is_an_error() {
        let payload = json!({"choices": []});
        assert!(matches!(
            OpenAiProvider::parse_response(payload),
            Err(LlmError::ApiError(_))
        ));
    }
}
