//! Configuration and settings management
//!
//! Loads agent settings from environment variables and defines the
//! defaults for the spreadsheet agent.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum LLM calls per user turn
pub const AGENT_MAX_ITERATIONS: usize = 5;
/// Persisted conversation turns per chat
pub const HISTORY_LIMIT: usize = 10;
/// A chat's session is dropped after this long without a message
pub const SESSION_IDLE_TIMEOUT_SECS: u64 = 24 * 60 * 60;
/// Upper bound on chats kept in memory at once
pub const SESSION_MAX_CHATS: u64 = 10_000;
/// Timeout for a single tool execution
pub const TOOL_TIMEOUT_SECS: u64 = 60;
/// HTTP timeout for LLM requests
pub const LLM_TIMEOUT_SECS: u64 = 120;
/// Output token cap for vendors that require one
pub const LLM_MAX_TOKENS: u32 = 4096;
/// Default location of the service-account key
pub const DEFAULT_CREDENTIALS_FILE: &str = "/app/credentials.json";
/// Reply used when the model finishes without any text
pub const EMPTY_REPLY_FALLBACK: &str = "Done!";
/// Reply used when a turn runs out of iterations
pub const ITERATION_CAP_FALLBACK: &str = "I couldn't finish that request within the allowed number of steps. Please try rephrasing or breaking it into smaller requests.";

/// Supported LLM vendors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// `OpenAI` chat completions
    OpenAi,
    /// Anthropic messages API
    Anthropic,
    /// Google Gemini
    Google,
    /// Local Ollama server
    Ollama,
}

impl ProviderKind {
    /// Model used when none is configured.
    #[must_use]
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4-turbo",
            Self::Anthropic => "claude-3-5-sonnet-latest",
            Self::Google => "gemini-1.5-pro",
            Self::Ollama => "llama3.1",
        }
    }

    /// Whether the vendor needs an API key.
    #[must_use]
    pub const fn requires_api_key(self) -> bool {
        !matches!(self, Self::Ollama)
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "google" | "gemini" => Ok(Self::Google),
            "ollama" => Ok(Self::Ollama),
            other => Err(format!(
                "Unsupported LLM provider: {other}. Use: openai, anthropic, google, or ollama"
            )),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Google => "google",
            Self::Ollama => "ollama",
        };
        f.write_str(name)
    }
}

/// Agent settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AgentSettings {
    /// LLM vendor selector
    #[serde(default = "default_llm_provider")]
    pub llm_provider: String,
    /// LLM API key
    pub llm_api_key: Option<String>,
    /// Legacy key, used when `LLM_API_KEY` is unset
    pub openai_api_key: Option<String>,
    /// LLM model name
    pub llm_model: Option<String>,
    /// Legacy model name, used when `LLM_MODEL` is unset
    pub openai_model: Option<String>,
    /// Custom LLM endpoint
    pub llm_base_url: Option<String>,
    /// HTTP timeout for LLM requests in seconds
    #[serde(default = "default_llm_timeout_secs")]
    pub llm_timeout_secs: u64,
    /// Output token cap
    #[serde(default = "default_llm_max_tokens")]
    pub llm_max_tokens: u32,

    /// Default spreadsheet ID
    pub google_sheet_id: Option<String>,
    /// Path to the service-account JSON key
    #[serde(default = "default_credentials_file")]
    pub google_credentials_file: String,

    /// Maximum LLM calls per turn
    #[serde(default = "default_agent_max_iterations")]
    pub agent_max_iterations: usize,
    /// Persisted turns per chat
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// Timeout for a single tool execution in seconds
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,

    /// Log verbosity for the workspace crates
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_llm_provider() -> String {
    "openai".to_string()
}

const fn default_llm_timeout_secs() -> u64 {
    LLM_TIMEOUT_SECS
}

const fn default_llm_max_tokens() -> u32 {
    LLM_MAX_TOKENS
}

fn default_credentials_file() -> String {
    DEFAULT_CREDENTIALS_FILE.to_string()
}

const fn default_agent_max_iterations() -> usize {
    AGENT_MAX_ITERATIONS
}

const fn default_history_limit() -> usize {
    HISTORY_LIMIT
}

const fn default_tool_timeout_secs() -> u64 {
    TOOL_TIMEOUT_SECS
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            llm_provider: default_llm_provider(),
            llm_api_key: None,
            openai_api_key: None,
            llm_model: None,
            openai_model: None,
            llm_base_url: None,
            llm_timeout_secs: LLM_TIMEOUT_SECS,
            llm_max_tokens: LLM_MAX_TOKENS,
            google_sheet_id: None,
            google_credentials_file: default_credentials_file(),
            agent_max_iterations: AGENT_MAX_ITERATIONS,
            history_limit: HISTORY_LIMIT,
            tool_timeout_secs: TOOL_TIMEOUT_SECS,
            log_level: default_log_level(),
        }
    }
}

/// Build the layered configuration source shared by all settings structs.
///
/// # Errors
///
/// Returns a `ConfigError` if a configuration file is malformed.
pub fn build_config() -> Result<Config, ConfigError> {
    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name("config/local").required(false))
        // UPPER_SNAKE_CASE env vars map to snake_case keys
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

impl AgentSettings {
    /// Create new settings by loading from environment and files.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails, the provider name is unknown,
    /// or the selected provider has no API key.
    pub fn new() -> Result<Self, ConfigError> {
        let settings: Self = build_config()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check cross-field requirements.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Message` describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let kind = self.provider_kind()?;
        if kind.requires_api_key() && self.api_key().is_none() {
            return Err(ConfigError::Message(format!(
                "LLM_API_KEY is required for the {kind} provider"
            )));
        }
        if self.agent_max_iterations == 0 {
            return Err(ConfigError::Message(
                "AGENT_MAX_ITERATIONS must be at least 1".to_string(),
            ));
        }
        if self.history_limit == 0 {
            return Err(ConfigError::Message(
                "HISTORY_LIMIT must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Parsed LLM vendor.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Message` for an unknown provider name.
    pub fn provider_kind(&self) -> Result<ProviderKind, ConfigError> {
        self.llm_provider.parse().map_err(ConfigError::Message)
    }

    /// API key, falling back to the legacy `OPENAI_API_KEY`.
    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.llm_api_key
            .as_deref()
            .or(self.openai_api_key.as_deref())
            .filter(|key| !key.trim().is_empty())
    }

    /// Model name, falling back to `OPENAI_MODEL` and then the vendor default.
    #[must_use]
    pub fn model(&self) -> String {
        if let Some(model) = self
            .llm_model
            .as_deref()
            .or(self.openai_model.as_deref())
            .filter(|m| !m.trim().is_empty())
        {
            return model.to_string();
        }
        self.provider_kind()
            .unwrap_or(ProviderKind::OpenAi)
            .default_model()
            .to_string()
    }

    /// Configured default spreadsheet, if any.
    #[must_use]
    pub fn default_spreadsheet(&self) -> Option<&str> {
        self.google_sheet_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::{AgentSettings, ProviderKind};

    #[test]
    fn test_provider_parsing() {
        assert_eq!("OpenAI".parse::<ProviderKind>(), Ok(ProviderKind::OpenAi));
        assert_eq!(" anthropic ".parse::<ProviderKind>(), Ok(ProviderKind::Anthropic));
        assert_eq!("google".parse::<ProviderKind>(), Ok(ProviderKind::Google));
        assert_eq!("ollama".parse::<ProviderKind>(), Ok(ProviderKind::Ollama));
        assert!("mistral".parse::<ProviderKind>().is_err());
        assert_eq!(ProviderKind::Google.to_string(), "google");
    }

    #[test]
    fn test_legacy_fallbacks() {
        let settings = AgentSettings {
            openai_api_key: Some("sk-legacy".to_string()),
            openai_model: Some("gpt-4o".to_string()),
            ..AgentSettings::default()
        };
        assert_eq!(settings.api_key(), Some("sk-legacy"));
        assert_eq!(settings.model(), "gpt-4o");

        let settings = AgentSettings {
            llm_api_key: Some("new".to_string()),
            openai_api_key: Some("old".to_string()),
            ..AgentSettings::default()
        };
        assert_eq!(settings.api_key(), Some("new"));
    }

    #[test]
    fn test_model_defaults_per_provider() {
        let settings = AgentSettings {
            llm_provider: "anthropic".to_string(),
            ..AgentSettings::default()
        };
        assert_eq!(settings.model(), "claude-3-5-sonnet-latest");
        assert_eq!(AgentSettings::default().model(), "gpt-4-turbo");
    }

    #[test]
    fn test_validation() {
        let missing_key = AgentSettings::default();
        assert!(missing_key.validate().is_err());

        let ollama = AgentSettings {
            llm_provider: "ollama".to_string(),
            ..AgentSettings::default()
        };
        assert!(ollama.validate().is_ok());

        let unknown = AgentSettings {
            llm_provider: "cohere".to_string(),
            llm_api_key: Some("k".to_string()),
            ..AgentSettings::default()
        };
        let err = unknown.validate().err().map(|e| e.to_string()).unwrap_or_default();
        assert!(err.contains("Unsupported LLM provider"));

        let zero_cap = AgentSettings {
            llm_api_key: Some("k".to_string()),
            agent_max_iterations: 0,
            ..AgentSettings::default()
        };
        assert!(zero_cap.validate().is_err());
    }

    #[test]
    fn test_blank_sheet_id_is_ignored() {
        let settings = AgentSettings {
            google_sheet_id: Some("   ".to_string()),
            ..AgentSettings::default()
        };
        assert_eq!(settings.default_spreadsheet(), None);
    }
}
