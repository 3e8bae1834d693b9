//! Reply formatting and delivery.
//!
//! Agent replies are Telegram HTML written by the model. They are split to
//! fit a message, sanitized, and sent with HTML parse mode. A part that
//! Telegram refuses to parse is sent again as plain text.

use super::resilient::send_message_resilient;
use crate::config::TELEGRAM_MESSAGE_LIMIT;
use opensloth_core::utils::{sanitize_html, split_long_message};
use teloxide::prelude::*;
use teloxide::types::{ChatId, ParseMode};
use teloxide::RequestError;
use tracing::warn;

/// One outgoing message in both renderings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyPart {
    /// Sanitized HTML
    pub html: String,
    /// Text as the model wrote it
    pub plain: String,
}

/// Split a reply into Telegram-sized parts.
///
/// ```
/// use opensloth_transport_telegram::bot::messaging::render_reply;
/// let parts = render_reply("<b>Done</b> & saved");
/// assert_eq!(parts[0].html, "<b>Done</b> &amp; saved");
/// ```
#[must_use]
pub fn render_reply(text: &str) -> Vec<ReplyPart> {
    split_long_message(text, TELEGRAM_MESSAGE_LIMIT)
        .into_iter()
        .filter(|part| !part.trim().is_empty())
        .map(|plain| ReplyPart {
            html: sanitize_html(&plain),
            plain,
        })
        .collect()
}

/// Send an agent reply, splitting it if needed.
///
/// # Errors
///
/// Returns the Telegram error when a part cannot be delivered in either
/// rendering.
pub async fn send_reply(bot: &Bot, chat_id: ChatId, text: &str) -> Result<(), RequestError> {
    for part in render_reply(text) {
        if let Err(e) =
            send_message_resilient(bot, chat_id, part.html.as_str(), Some(ParseMode::Html)).await
        {
            warn!(chat_id = chat_id.0, error = %e, "HTML reply rejected, sending plain text");
            send_message_resilient(bot, chat_id, part.plain, None).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_reply_is_one_part() {
        let parts = render_reply("Added row <code>7</code> to <i>Tasks</i>");
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].html, "Added row <code>7</code> to <i>Tasks</i>");
    }

    #[test]
    fn test_unknown_tags_are_escaped() {
        let parts = render_reply("<h1>Title</h1> 1 < 2");
        assert_eq!(parts[0].html, "&lt;h1&gt;Title&lt;/h1&gt; 1 &lt; 2");
        assert_eq!(parts[0].plain, "<h1>Title</h1> 1 < 2");
    }

    #[test]
    fn test_long_reply_is_split() {
        let text = "- Row with some content\n".repeat(400);
        let parts = render_reply(&text);
        assert!(parts.len() > 1);
        assert!(parts.iter().all(|p| p.plain.len() <= TELEGRAM_MESSAGE_LIMIT));
    }

    #[test]
    fn test_blank_reply_sends_nothing() {
        assert!(render_reply("  \n").is_empty());
    }
}
