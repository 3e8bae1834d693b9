//! Telegram transport settings.

use config::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

/// Default long-poll timeout in seconds.
pub const DEFAULT_POLL_INTERVAL: f64 = 1.0;
/// Shortest long-poll timeout in seconds.
pub const MIN_POLL_TIMEOUT_SECS: u64 = 1;
/// Longest long-poll timeout in seconds, below the HTTP client timeout.
pub const MAX_POLL_TIMEOUT_SECS: u64 = 10;
/// Maximum message length for Telegram with safety margin.
/// Telegram's official limit is 4096.
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4000;

/// Initial backoff for Telegram API retries (ms).
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Upper bound for a single Telegram API retry delay (ms).
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4000;
/// Retries after the first failed Telegram API call.
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;
/// Longest flood-control wait that is still retried (s).
pub const TELEGRAM_API_MAX_RETRY_AFTER_SECS: u32 = 30;

/// Telegram transport settings loaded from environment variables.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TelegramSettings {
    /// Telegram Bot API token.
    #[serde(alias = "telegram_token")]
    pub telegram_bot_token: String,
    /// Allowed user ids and usernames, comma/semicolon/space separated.
    #[serde(rename = "allowed_users")]
    pub allowed_users_str: Option<String>,
    /// Long-poll timeout for `getUpdates`, in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: f64,
}

const fn default_poll_interval() -> f64 {
    DEFAULT_POLL_INTERVAL
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            telegram_bot_token: String::new(),
            allowed_users_str: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Combined settings used by the Telegram transport layer.
#[derive(Clone)]
pub struct BotSettings {
    /// Agent settings shared across transport handlers.
    pub agent: Arc<opensloth_core::config::AgentSettings>,
    /// Telegram-specific settings.
    pub telegram: Arc<TelegramSettings>,
}

impl BotSettings {
    /// Create a new combined settings bundle.
    #[must_use]
    pub fn new(agent: opensloth_core::config::AgentSettings, telegram: TelegramSettings) -> Self {
        Self {
            agent: Arc::new(agent),
            telegram: Arc::new(telegram),
        }
    }
}

impl TelegramSettings {
    /// Create new settings by loading from environment and files.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails or the bot token is empty.
    pub fn new() -> Result<Self, ConfigError> {
        let settings: Self = opensloth_core::config::build_config()?.try_deserialize()?;
        if settings.telegram_bot_token.trim().is_empty() {
            return Err(ConfigError::Message(
                "TELEGRAM_BOT_TOKEN is required".to_string(),
            ));
        }
        Ok(settings)
    }

    /// Parsed allow-list.
    #[must_use]
    pub fn allowed_users(&self) -> AllowList {
        AllowList::parse(self.allowed_users_str.as_deref().unwrap_or_default())
    }

    /// Long-poll timeout rounded to whole seconds.
    ///
    /// `getUpdates` only takes whole seconds and the request must finish
    /// before the HTTP client gives up, so the value is kept within
    /// `MIN_POLL_TIMEOUT_SECS..=MAX_POLL_TIMEOUT_SECS`.
    #[must_use]
    pub fn poll_timeout(&self) -> std::time::Duration {
        let requested = if self.poll_interval.is_nan() {
            DEFAULT_POLL_INTERVAL
        } else {
            self.poll_interval.round()
        };
        #[allow(clippy::cast_precision_loss)]
        let clamped = requested.clamp(
            MIN_POLL_TIMEOUT_SECS as f64,
            MAX_POLL_TIMEOUT_SECS as f64,
        );
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let secs = clamped as u64;
        if (clamped - requested).abs() > f64::EPSILON {
            warn!(
                poll_interval = self.poll_interval,
                poll_timeout_secs = secs,
                "POLL_INTERVAL out of range, clamped"
            );
        }
        std::time::Duration::from_secs(secs)
    }
}

/// Users permitted to talk to the bot.
///
/// Entries are numeric ids or usernames. An empty list lets everyone in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    ids: HashSet<i64>,
    usernames: HashSet<String>,
}

impl AllowList {
    /// Parse a list separated by `,`, `;` or whitespace.
    ///
    /// A leading `@` on usernames is dropped and usernames compare
    /// case-insensitively.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let mut list = Self::default();
        for token in raw
            .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
            .filter(|token| !token.is_empty())
        {
            if let Ok(id) = token.parse::<i64>() {
                list.ids.insert(id);
                continue;
            }
            let name = token.trim_start_matches('@');
            if !name.is_empty() {
                list.usernames.insert(name.to_lowercase());
            }
        }
        list
    }

    /// Whether nobody is listed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty() && self.usernames.is_empty()
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len() + self.usernames.len()
    }

    /// Check a sender against the list.
    #[must_use]
    pub fn is_allowed(&self, user_id: i64, username: Option<&str>) -> bool {
        if self.is_empty() || self.ids.contains(&user_id) {
            return true;
        }
        username
            .map(|name| name.trim_start_matches('@').to_lowercase())
            .is_some_and(|name| self.usernames.contains(&name))
    }
}

/// Cooldown period (seconds) between "Access denied" messages for same user.
/// Default: 20 minutes.
pub const UNAUTHORIZED_COOLDOWN_SECS: u64 = 1200;
/// Time-to-live (seconds) for cache entries.
/// Default: 2 hours.
pub const UNAUTHORIZED_CACHE_TTL_SECS: u64 = 7200;
/// Maximum cache capacity (number of entries).
pub const UNAUTHORIZED_CACHE_MAX_SIZE: u64 = 10_000;

fn env_or(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// Get unauthorized cooldown from env or default.
///
/// Environment variable: `UNAUTHORIZED_COOLDOWN_SECS`.
#[must_use]
pub fn get_unauthorized_cooldown() -> u64 {
    env_or("UNAUTHORIZED_COOLDOWN_SECS", UNAUTHORIZED_COOLDOWN_SECS)
}

/// Get unauthorized cache TTL from env or default.
///
/// Environment variable: `UNAUTHORIZED_CACHE_TTL_SECS`.
#[must_use]
pub fn get_unauthorized_cache_ttl() -> u64 {
    env_or("UNAUTHORIZED_CACHE_TTL_SECS", UNAUTHORIZED_CACHE_TTL_SECS)
}

/// Get unauthorized cache max size from env or default.
///
/// Environment variable: `UNAUTHORIZED_CACHE_MAX_SIZE`.
#[must_use]
pub fn get_unauthorized_cache_max_size() -> u64 {
    env_or("UNAUTHORIZED_CACHE_MAX_SIZE", UNAUTHORIZED_CACHE_MAX_SIZE)
}
