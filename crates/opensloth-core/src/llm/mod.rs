//! LLM providers
//!
//! One capability, [`LlmProvider::generate`], implemented once per vendor
//! (`OpenAI`, Anthropic, Google Gemini, Ollama). The agent loop only sees the trait.

mod http_utils;
/// Implementations of specific LLM providers
pub mod providers;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::config::{AgentSettings, ProviderKind};

/// Errors that can occur during LLM operations
#[derive(Debug, Error)]
pub enum LlmError {
    /// Error returned by the provider's API
    #[error("API error: {0}")]
    ApiError(String),
    /// Error during network communication
    #[error("Network error: {0}")]
    NetworkError(String),
    /// Error during JSON serialization or deserialization
    #[error("JSON error: {0}")]
    JsonError(String),
    /// Missing provider configuration or API key
    #[error("Missing client/API key: {0}")]
    MissingConfig(String),
    /// Rate limit exceeded (429), optionally with a wait time
    #[error("Rate limit exceeded: {message} (wait: {wait_secs:?}s)")]
    RateLimit {
        /// Retry-After duration in seconds, if provided by the server
        wait_secs: Option<u64>,
        /// Error message from the server
        message: String,
    },
    /// Any other unexpected error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// A message in an LLM conversation
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Message {
    /// Role of the message sender (user, assistant, tool)
    pub role: String,
    /// Text content of the message
    pub content: String,
    /// Tool call ID (for tool responses)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Tool name (for tool responses)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Tool calls made by the assistant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl Message {
    /// Create a new user message
    #[must_use]
    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
            tool_call_id: None,
            name: None,
            tool_calls: None,
        }
    }

    /// Create a new assistant message
    #[must_use]
    pub fn assistant(content: &str) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.to_string(),
            tool_call_id: None,
            name: None,
            tool_calls: None,
        }
    }

    /// Create a new assistant message with tool calls
    #[must_use]
    pub fn assistant_with_tools(content: &str, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.to_string(),
            tool_call_id: None,
            name: None,
            tool_calls: Some(tool_calls),
        }
    }

    /// Create a new tool response message
    #[must_use]
    pub fn tool(tool_call_id: &str, name: &str, content: &str) -> Self {
        Self {
            role: "tool".to_string(),
            content: content.to_string(),
            tool_call_id: Some(tool_call_id.to_string()),
            name: Some(name.to_string()),
            tool_calls: None,
        }
    }

    /// Returns true for a tool-role message.
    #[must_use]
    pub fn is_tool_result(&self) -> bool {
        self.role == "tool"
    }
}

/// Tool definition for LLM function calling
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    /// Name of the tool
    pub name: String,
    /// Description of what the tool does
    pub description: String,
    /// JSON schema for tool parameters
    pub parameters: Value,
}

/// Tool call requested by the model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// Unique identifier for the tool call
    pub id: String,
    /// Name of the tool to run
    pub name: String,
    /// Arguments as sent by the model.
    ///
    /// Usually an object. Arguments that were not valid JSON are kept verbatim
    /// as a string so validation can reject them.
    pub arguments: Value,
}

impl ToolCall {
    /// Create a tool call from already-decoded arguments.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Arguments encoded as a JSON string, the way OpenAI-style APIs expect them.
    #[must_use]
    pub fn arguments_json(&self) -> String {
        match &self.arguments {
            Value::String(raw) => raw.clone(),
            other => other.to_string(),
        }
    }
}

/// Decode a vendor's stringified tool arguments.
///
/// Empty input means no arguments. Invalid JSON is preserved as a string.
#[must_use]
pub fn parse_tool_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(serde_json::Map::new());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Generate a call id for vendors that do not return one.
#[must_use]
pub fn generate_call_id() -> String {
    format!("call_{}", uuid::Uuid::new_v4().simple())
}

/// Outcome of a single model call
#[derive(Debug, Clone, PartialEq)]
pub enum LlmResponse {
    /// Natural-language answer, the turn is complete
    FinalMessage(String),
    /// The model wants these tools run, in this order
    ToolCalls(Vec<ToolCall>),
}

impl LlmResponse {
    /// Build a response from the text and calls found in a vendor payload.
    ///
    /// Tool calls take precedence over text.
    #[must_use]
    pub fn from_parts(text: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        if tool_calls.is_empty() {
            Self::FinalMessage(text.unwrap_or_default())
        } else {
            Self::ToolCalls(tool_calls)
        }
    }
}

/// Interface for all LLM providers
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Vendor name used in logs
    fn name(&self) -> &'static str;

    /// Model identifier sent to the vendor
    fn model(&self) -> String;

    /// Send the transcript and tool catalog, returning either text or tool calls.
    async fn generate(
        &self,
        system_prompt: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<LlmResponse, LlmError>;
}

/// Build the provider selected by `LLM_PROVIDER`.
///
/// # Errors
///
/// Returns `LlmError::MissingConfig` for an unknown provider or a missing API key.
pub fn create_provider(settings: &AgentSettings) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let kind = settings
        .provider_kind()
        .map_err(|e| LlmError::MissingConfig(e.to_string()))?;
    let model = settings.model();
    let base_url = settings.llm_base_url.clone();
    let http_client = http_utils::create_http_client(settings.llm_timeout_secs);

    let api_key = || {
        settings
            .api_key()
            .map(ToString::to_string)
            .ok_or_else(|| LlmError::MissingConfig(format!("LLM_API_KEY for {kind}")))
    };

    info!(provider = %kind, model = %model, "Using LLM provider");

    let provider: Arc<dyn LlmProvider> = match kind {
        ProviderKind::OpenAi => Arc::new(providers::OpenAiProvider::new(
            http_client,
            api_key()?,
            model,
            base_url,
        )),
        ProviderKind::Anthropic => Arc::new(providers::AnthropicProvider::new(
            http_client,
            api_key()?,
            model,
            base_url,
            settings.llm_max_tokens,
        )),
        ProviderKind::Google => Arc::new(providers::GeminiProvider::new(
            http_client,
            api_key()?,
            model,
            base_url,
            settings.llm_max_tokens,
        )),
        ProviderKind::Ollama => Arc::new(providers::OllamaProvider::new(
            http_client,
            settings.api_key().map(ToString::to_string),
            model,
            base_url,
        )),
    };

    Ok(provider)
}
