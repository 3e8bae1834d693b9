use crate::llm::http_utils::{join_url, send_json_request};
use crate::llm::{
    generate_call_id, LlmError, LlmProvider, LlmResponse, Message, ToolCall, ToolDefinition,
};
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde_json::{json, Value};
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// LLM provider implementation for Google Gemini
pub struct GeminiProvider {
    http_client: HttpClient,
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
}

impl GeminiProvider {
    /// Create a new Gemini provider instance
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

    pub(crate) fn prepare_contents(history: &[Message]) -> Vec<Value> {
        let mut contents: Vec<Value> = Vec::new();

        for msg in history {
            let (role, parts) = match msg.role.as_str() {
                "tool" => {
                    // Tool output is JSON text; pass it structured when it parses
                    let result = serde_json::from_str::<Value>(&msg.content)
                        .unwrap_or_else(|_| Value::String(msg.content.clone()));
                    (
                        "user",
                        vec![json!({
                            "functionResponse": {
                                "name": msg.name.as_deref().unwrap_or_default(),
                                "response": {"result": result}
                            }
                        })],
                    )
                }
                "assistant" => {
                    let mut parts = Vec::new();
                    if !msg.content.trim().is_empty() {
                        parts.push(json!({"text": msg.content}));
                    }
                    for call in msg.tool_calls.iter().flatten() {
                        let args = if call.arguments.is_object() {
                            call.arguments.clone()
                        } else {
                            json!({})
                        };
                        parts.push(json!({
                            "functionCall": {"name": call.name, "args": args}
                        }));
                    }
                    ("model", parts)
                }
                _ => {
                    if msg.content.trim().is_empty() {
                        continue;
                    }
                    ("user", vec![json!({"text": msg.content})])
                }
            };

            if parts.is_empty() || (contents.is_empty() && role != "user") {
                continue;
            }

            match contents.last_mut() {
                Some(last) if last["role"] == role => {
                    if let Some(existing) = last["parts"].as_array_mut() {
                        existing.extend(parts);
                    }
                }
                _ => contents.push(json!({"role": role, "parts": parts})),
            }
        }

        contents
    }

    fn prepare_tools(tools: &[ToolDefinition]) -> Value {
        let declarations: Vec<Value> = tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "parametersJsonSchema": t.parameters
                })
            })
            .collect();
        json!([{ "functionDeclarations": declarations }])
    }

    fn parse_response(res_json: &Value) -> Result<LlmResponse, LlmError> {
        let Some(candidate) = res_json.pointer("/candidates/0") else {
            let reason = res_json
                .pointer("/promptFeedback/blockReason")
                .and_then(Value::as_str)
                .unwrap_or("no candidates returned");
            return Err(LlmError::ApiError(format!("Gemini returned no answer: {reason}")));
        };

        let finish_reason = candidate
            .get("finishReason")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        debug!(finish_reason, "Gemini response received");

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        let parts = candidate
            .pointer("/content/parts")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        for part in parts {
            if let Some(t) = part.get("text").and_then(Value::as_str) {
                text.push_str(t);
            }
            if let Some(call) = part.get("functionCall") {
                let name = call
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| LlmError::JsonError("functionCall without name".to_string()))?;
                let args = call.get("args").cloned().unwrap_or_else(|| json!({}));
                tool_calls.push(ToolCall::new(generate_call_id(), name, args));
            }
        }

        Ok(LlmResponse::from_parts(Some(text), tool_calls))
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "google"
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
        let url = join_url(
            &self.base_url,
            &format!("v1beta/models/{}:generateContent", self.model),
        );

        let mut body = json!({
            "contents": Self::prepare_contents(messages),
            "systemInstruction": {
                "parts": [{"text": system_prompt}]
            },
            "generationConfig": {
                "maxOutputTokens": self.max_tokens
            }
        });
        if !tools.is_empty() {
            body["tools"] = Self::prepare_tools(tools);
        }

        let res_json = send_json_request(
            &self.http_client,
            &url,
            &body,
            None,
            &[("x-goog-api-key", self.api_key.as_str())],
        )
        .await?;

        Self::parse_response(&res_json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_responses_follow_model_calls() {
        let history = vec![
            Message::user("what tabs exist?"),
            Message::assistant_with_tools("", vec![ToolCall::new("c1", "list_sheets", json!({}))]),
            Message::tool("c1", "list_sheets", r#"{"sheets":[{"name":"Tasks"}]}"#),
        ];

        let contents = GeminiProvider::prepare_contents(&history);

        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[1]["parts"][0]["functionCall"]["name"], "list_sheets");
        assert_eq!(contents[2]["role"], "user");
        let response = &contents[2]["parts"][0]["functionResponse"];
        assert_eq!(response["name"], "list_sheets");
        assert_eq!(response["response"]["result"]["sheets"][0]["name"], "Tasks");
    }

    #[test]
    fn test_parse_function_call_generates_ids() {
        let payload = json!({
            "candidates": [{
                "finishReason": "STOP",
                "content": {"role": "model", "parts": [
                    {"functionCall": {"name": "read_sheet", "args": {"sheet_name": "Tasks"}}},
                    {"functionCall": {"name": "list_sheets"}}
                ]}
            }]
        });

        let Ok(LlmResponse::ToolCalls(calls)) = GeminiProvider::parse_response(&payload) else {
            panic!("expected tool calls");
        };
        assert_eq!(calls.len(), 2);
        assert_ne!(calls[0].id, calls[1].id);
        assert_eq!(calls[0].arguments, json!({"sheet_name": "Tasks"}));
        assert_eq!(calls[1].arguments, json!({}));
    }

    #[test]
    fn test_blocked_prompt_is_an_error() {
        let payload = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        assert!(matches!(
            GeminiProvider::parse_response(&payload),
            Err(LlmError::ApiError(ref m)) if m.contains("SAFETY")
        ));
    }
}
