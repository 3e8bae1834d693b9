//! Chat session registry
//!
//! One session per chat. A turn holds its session's mutex from start to
//! finish, so two turns of the same chat never interleave while different
//! chats proceed independently. Sessions idle for longer than the idle
//! timeout are forgotten.

use super::memory::ConversationHistory;
use crate::config::{SESSION_IDLE_TIMEOUT_SECS, SESSION_MAX_CHATS};
use moka::future::Cache;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// State kept between turns of one chat
#[derive(Debug, Clone)]
pub struct ChatSession {
    /// Recent user and assistant turns
    pub history: ConversationHistory,
    /// Spreadsheet opened with `open_sheet`, overriding the default
    pub active_spreadsheet: Option<String>,
}

impl ChatSession {
    /// Fresh session with an empty history
    #[must_use]
    pub fn new(history_limit: usize) -> Self {
        Self {
            history: ConversationHistory::new(history_limit),
            active_spreadsheet: None,
        }
    }
}

/// Session registry keyed by chat id
///
/// Generic over the id type so transports other than Telegram can key by
/// their own identifiers.
pub struct SessionRegistry<Id: Hash + Eq + Clone + Send + Sync + std::fmt::Debug + 'static> {
    sessions: Cache<Id, Arc<Mutex<ChatSession>>>,
    history_limit: usize,
}

impl<Id: Hash + Eq + Clone + Send + Sync + std::fmt::Debug + 'static> SessionRegistry<Id> {
    /// Create a new empty registry with the default idle timeout
    #[must_use]
    pub fn new(history_limit: usize) -> Self {
        Self::with_idle_timeout(history_limit, Duration::from_secs(SESSION_IDLE_TIMEOUT_SECS))
    }

    /// Create a registry that forgets chats idle for longer than `idle`
    #[must_use]
    pub fn with_idle_timeout(history_limit: usize, idle: Duration) -> Self {
        let sessions = Cache::builder()
            .max_capacity(SESSION_MAX_CHATS)
            .time_to_idle(idle)
            .eviction_listener(|chat, _, cause| {
                debug!(chat = ?chat, cause = ?cause, "Chat session dropped");
            })
            .build();
        Self {
            sessions,
            history_limit,
        }
    }

    /// Get the session for `id`, creating it on first use
    pub async fn get_or_create(&self, id: &Id) -> Arc<Mutex<ChatSession>> {
        self.sessions
            .get_with_by_ref(id, async {
                debug!(chat = ?id, "Created chat session");
                Arc::new(Mutex::new(ChatSession::new(self.history_limit)))
            })
            .await
    }

    /// Get session if exists
    pub async fn get(&self, id: &Id) -> Option<Arc<Mutex<ChatSession>>> {
        self.sessions.get(id).await
    }

    /// Whether a turn is currently running for this chat
    pub async fn is_busy(&self, id: &Id) -> bool {
        let Some(session) = self.get(id).await else {
            return false;
        };
        // Lock held = turn running
        let busy = session.try_lock().is_err();
        busy
    }

    /// Forget a chat's history and opened sheet
    pub async fn remove(&self, id: &Id) -> bool {
        self.sessions.remove(id).await.is_some()
    }

    /// Number of known chats
    pub async fn len(&self) -> usize {
        self.sessions.run_pending_tasks().await;
        usize::try_from(self.sessions.entry_count()).unwrap_or(usize::MAX)
    }

    /// Whether no chat has a session yet
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
