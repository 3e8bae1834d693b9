//! Telegram API calls with automatic retry.
//!
//! Network failures and flood-control answers are retried with exponential
//! backoff and jitter. A flood-control answer is retried only after the wait
//! Telegram asked for, and not at all when that wait is too long. API
//! rejections such as a malformed HTML entity are returned at once since
//! repeating the call cannot change the outcome.

use crate::config::{
    TELEGRAM_API_INITIAL_BACKOFF_MS, TELEGRAM_API_MAX_BACKOFF_MS, TELEGRAM_API_MAX_RETRIES,
    TELEGRAM_API_MAX_RETRY_AFTER_SECS,
};
use std::future::Future;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::{ChatId, Message, ParseMode};
use teloxide::RequestError;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::warn;

/// Whether a failed request is worth repeating
#[must_use]
pub fn is_retryable(error: &RequestError) -> bool {
    match error {
        RequestError::Network(_) | RequestError::Io(_) => true,
        RequestError::RetryAfter(_) => flood_wait(error).is_some(),
        _ => false,
    }
}

/// Wait requested by a flood-control answer, if short enough to honor
fn flood_wait(error: &RequestError) -> Option<Duration> {
    match error {
        RequestError::RetryAfter(wait) if wait.seconds() <= TELEGRAM_API_MAX_RETRY_AFTER_SECS => {
            Some(Duration::from_secs(u64::from(wait.seconds())))
        }
        _ => None,
    }
}

/// Run a Telegram API operation, retrying transient failures.
///
/// # Errors
///
/// Returns the last error once retries are exhausted, or the first
/// non-retryable error.
pub async fn retry_telegram_operation<F, Fut, T>(mut operation: F) -> Result<T, RequestError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RequestError>>,
{
    // Delays grow 2^n * base: 500ms, 1s, 2s before jitter
    let retry_strategy = ExponentialBackoff::from_millis(2)
        .factor(TELEGRAM_API_INITIAL_BACKOFF_MS / 2)
        .max_delay(Duration::from_millis(TELEGRAM_API_MAX_BACKOFF_MS))
        .map(jitter)
        .take(TELEGRAM_API_MAX_RETRIES);

    let mut attempt = 0;
    let attempt_honoring_flood_wait = move || {
        attempt += 1;
        let retries_left = attempt <= TELEGRAM_API_MAX_RETRIES;
        let call = operation();
        async move {
            let result = call.await;
            if let Err(e) = &result {
                if let Some(wait) = flood_wait(e).filter(|_| retries_left) {
                    warn!(wait_secs = wait.as_secs(), "Telegram flood control, waiting");
                    tokio::time::sleep(wait).await;
                }
            }
            result
        }
    };

    RetryIf::spawn(retry_strategy, attempt_honoring_flood_wait, |e: &RequestError| {
        let retry = is_retryable(e);
        if retry {
            warn!(error = %e, "Telegram API call failed, retrying");
        }
        retry
    })
    .await
    .map_err(|e| {
        warn!(error = %e, "Telegram API operation failed");
        e
    })
}

/// Send a message with automatic retry on network failures.
///
/// # Errors
///
/// Returns the Telegram error after all retries are exhausted.
pub async fn send_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    text: impl Into<String>,
    parse_mode: Option<ParseMode>,
) -> Result<Message, RequestError> {
    let text = text.into();
    retry_telegram_operation(|| async {
        let mut req = bot.send_message(chat_id, text.clone());
        if let Some(pm) = parse_mode {
            req = req.parse_mode(pm);
        }
        req.await
    })
    .await
}
