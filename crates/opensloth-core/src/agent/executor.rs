//! Agent executor
//!
//! [`SheetAgent`] turns one inbound chat message into one reply: it loads the
//! chat's session, builds the prompt around the active spreadsheet, runs the
//! tool loop and persists the result.

use super::memory::ConversationHistory;
use super::prompt::build_system_prompt;
use super::providers::{SheetTarget, SheetsToolProvider};
use super::registry::ToolRegistry;
use super::runner::{run_turn, RunnerConfig};
use super::session_registry::SessionRegistry;
use super::AgentError;
use crate::config::{AgentSettings, HISTORY_LIMIT};
use crate::llm::{LlmProvider, Message};
use crate::sheets::{SheetStructure, SheetsApi};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Who sent a message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserContext {
    /// Telegram user id
    pub user_id: i64,
    /// `@username` without the `@`
    pub username: Option<String>,
    /// First name
    pub first_name: Option<String>,
    /// Last name
    pub last_name: Option<String>,
}

impl UserContext {
    /// Name used to address the user in the prompt.
    ///
    /// Prefers the username, then the full name, then `User<id>`.
    #[must_use]
    pub fn display_name(&self) -> String {
        if let Some(username) = self.username.as_deref().filter(|u| !u.trim().is_empty()) {
            return username.to_string();
        }

        let full_name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        if full_name.is_empty() {
            format!("User{}", self.user_id)
        } else {
            full_name
        }
    }
}

/// Per-agent limits and defaults
#[derive(Debug, Clone)]
pub struct AgentOptions {
    /// Spreadsheet used until a chat opens another one
    pub default_spreadsheet: Option<String>,
    /// Turns kept per chat
    pub history_limit: usize,
    /// Loop limits
    pub runner: RunnerConfig,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            default_spreadsheet: None,
            history_limit: HISTORY_LIMIT,
            runner: RunnerConfig::default(),
        }
    }
}

impl AgentOptions {
    /// Options taken from the loaded settings
    #[must_use]
    pub fn from_settings(settings: &AgentSettings) -> Self {
        Self {
            default_spreadsheet: settings.default_spreadsheet().map(ToString::to_string),
            history_limit: settings.history_limit,
            runner: RunnerConfig {
                max_iterations: settings.agent_max_iterations,
                tool_timeout: Duration::from_secs(settings.tool_timeout_secs),
            },
        }
    }
}

/// Spreadsheet assistant shared by all chats
pub struct SheetAgent {
    llm: Arc<dyn LlmProvider>,
    sheets: Arc<dyn SheetsApi>,
    sessions: SessionRegistry<i64>,
    options: AgentOptions,
}

impl SheetAgent {
    /// Create an agent over a model provider and a Sheets client
    #[must_use]
    pub fn new(llm: Arc<dyn LlmProvider>, sheets: Arc<dyn SheetsApi>, options: AgentOptions) -> Self {
        Self {
            llm,
            sheets,
            sessions: SessionRegistry::new(options.history_limit),
            options,
        }
    }

    /// Service-account email users must share their sheets with
    #[must_use]
    pub fn service_account_email(&self) -> String {
        self.sheets.service_account_email()
    }

    /// Access the per-chat sessions
    #[must_use]
    pub const fn sessions(&self) -> &SessionRegistry<i64> {
        &self.sessions
    }

    /// Handle one user message and return the reply.
    ///
    /// Turns of the same chat run one at a time.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::Llm` when the model provider fails. Spreadsheet
    /// failures are handled inside the turn and never surface here.
    pub async fn process_message(
        &self,
        chat_id: i64,
        user: &UserContext,
        text: &str,
    ) -> Result<String, AgentError> {
        let session_arc = self.sessions.get_or_create(&chat_id).await;
        let mut session = session_arc.lock().await;
        let started = Instant::now();

        session.history.push(Message::user(text));

        let target = Arc::new(SheetTarget::new(
            session.active_spreadsheet.clone(),
            self.options.default_spreadsheet.clone(),
        ));
        let structure = self.fetch_structure(target.current().await.as_deref()).await;

        let system_prompt = build_system_prompt(
            structure.as_ref(),
            &self.sheets.service_account_email(),
            chrono::Local::now().date_naive(),
            &user.display_name(),
        );

        let mut registry = ToolRegistry::new();
        registry.register(Box::new(SheetsToolProvider::new(
            Arc::clone(&self.sheets),
            Arc::clone(&target),
        )));

        let mut transcript = session.history.messages();
        let result = run_turn(
            self.llm.as_ref(),
            &system_prompt,
            &mut transcript,
            &registry,
            &self.options.runner,
        )
        .await;

        session.active_spreadsheet = target.opened().await;
        let outcome = result?;

        session.history.push(Message::assistant(&outcome.text));
        info!(
            chat_id,
            user_id = user.user_id,
            llm_calls = outcome.llm_calls,
            tool_executions = outcome.tool_executions,
            hit_iteration_cap = outcome.hit_iteration_cap,
            duration_ms = started.elapsed().as_millis(),
            "Turn finished"
        );
        Ok(outcome.text)
    }

    /// Forget a chat's history and opened sheet
    pub async fn reset(&self, chat_id: i64) {
        self.sessions.remove(&chat_id).await;
    }

    /// Snapshot of a chat's stored history
    pub async fn history(&self, chat_id: i64) -> Option<ConversationHistory> {
        let session = self.sessions.get(&chat_id).await?;
        let history = session.lock().await.history.clone();
        Some(history)
    }

    async fn fetch_structure(&self, spreadsheet_id: Option<&str>) -> Option<SheetStructure> {
        let spreadsheet_id = spreadsheet_id?;
        match self.sheets.sheet_structure(spreadsheet_id).await {
            Ok(structure) => Some(structure),
            Err(e) => {
                debug!(spreadsheet = spreadsheet_id, error = %e, "Could not fetch sheet structure");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(username: Option<&str>, first: Option<&str>, last: Option<&str>) -> UserContext {
        UserContext {
            user_id: 42,
            username: username.map(ToString::to_string),
            first_name: first.map(ToString::to_string),
            last_name: last.map(ToString::to_string),
        }
    }

    #[test]
    fn test_display_name_preference() {
        assert_eq!(user(Some("ann"), Some("Ann"), None).display_name(), "ann");
        assert_eq!(user(None, Some("Ann"), Some("Lee")).display_name(), "Ann Lee");
        assert_eq!(user(Some(" "), None, Some("Lee")).display_name(), "Lee");
        assert_eq!(user(None, None, None).display_name(), "User42");
    }

    #[test]
    fn test_options_from_settings() {
        let settings = AgentSettings {
            google_sheet_id: Some("abc".to_string()),
            agent_max_iterations: 3,
            tool_timeout_secs: 15,
            ..AgentSettings::default()
        };
        let options = AgentOptions::from_settings(&settings);
        assert_eq!(options.default_spreadsheet.as_deref(), Some("abc"));
        assert_eq!(options.runner.max_iterations, 3);
        assert_eq!(options.runner.tool_timeout, Duration::from_secs(15));
    }
}
