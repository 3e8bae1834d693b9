use super::messaging::send_reply;
use anyhow::Result;
use opensloth_core::agent::{AgentError, SheetAgent, UserContext};
use opensloth_core::utils::truncate_str;
use std::sync::Arc;
use std::time::Instant;
use teloxide::{
    prelude::*,
    types::{ChatAction, ParseMode},
    utils::command::BotCommands,
};
use tracing::{debug, error, info};

/// Reply when the model provider cannot be reached
pub const LLM_FAILURE_REPLY: &str =
    "I'm having trouble connecting to the AI service right now. Please try again in a moment.";
/// Reply when a turn fails for any other reason
pub const GENERIC_FAILURE_REPLY: &str =
    "Something unexpected went wrong. Please try again or contact support if the issue persists.";
/// Reply to senders outside the allow-list
pub const ACCESS_DENIED_REPLY: &str = "Access denied. You are not authorized to use this bot.";

/// Supported commands for the bot
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Show the welcome message
    #[command(description = "Start the bot.")]
    Start,
    /// Show usage examples
    #[command(description = "Show usage examples.")]
    Help,
    /// Forget the chat history and the opened sheet
    #[command(description = "Clear chat history and close the opened sheet.")]
    Clear,
}

/// Safe extraction of user ID from a message.
/// Returns 0 if the user information is missing.
pub fn get_user_id_safe(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed())
}

/// Username or first name of the sender, for logs
pub fn get_user_name(msg: &Message) -> String {
    if let Some(ref user) = msg.from {
        if let Some(ref username) = user.username {
            return username.clone();
        }
        if !user.first_name.is_empty() {
            return user.first_name.clone();
        }
    }
    "Unknown".to_string()
}

/// Sender identity handed to the agent
pub fn user_context(msg: &Message) -> UserContext {
    msg.from
        .as_ref()
        .map_or_else(UserContext::default, |u| UserContext {
            user_id: u.id.0.cast_signed(),
            username: u.username.clone(),
            first_name: Some(u.first_name.clone()),
            last_name: u.last_name.clone(),
        })
}

fn share_target(service_email: &str) -> &str {
    if service_email.trim().is_empty() {
        "the service account"
    } else {
        service_email
    }
}

/// HTML text for `/start`
#[must_use]
pub fn welcome_text(service_email: &str) -> String {
    let email = share_target(service_email);
    format!(
        "<b>Welcome to OpenSloth!</b>\n\n\
         I can read and write to any Google Sheet you share with me.\n\n\
         <b>To give me access to a sheet:</b>\n\
         1. Open your Google Sheet\n\
         2. Click \"Share\" button\n\
         3. Add this email as Editor:\n\
         <code>{email}</code>\n\n\
         <b>What I can do:</b>\n\
         - Read data from any sheet\n\
         - Add, update, or delete rows\n\
         - Search across worksheets\n\
         - Work with multiple sheets\n\n\
         <b>Quick commands:</b>\n\
         - \"Show me all data\"\n\
         - \"Add a row with Name: John, Status: Active\"\n\
         - \"Open [paste sheet URL]\" - to switch sheets\n\n\
         Use /help for more examples."
    )
}

/// HTML text for `/help`
#[must_use]
pub fn help_text(service_email: &str) -> String {
    let email = share_target(service_email);
    format!(
        "<b>OpenSloth Help</b>\n\n\
         <b>Sharing a Sheet:</b>\n\
         Share your Google Sheet with:\n\
         <code>{email}</code>\n\
         (Give \"Editor\" access for read+write)\n\n\
         <b>Reading Data:</b>\n\
         - \"Show me all data\"\n\
         - \"What's in the sheet?\"\n\
         - \"Search for John\"\n\n\
         <b>Adding Data:</b>\n\
         - \"Add a row with Name: John, Email: john@example.com\"\n\n\
         <b>Updating Data:</b>\n\
         - \"Update row 3, set Status to Done\"\n\
         - \"Change row 5 Name to Jane\"\n\n\
         <b>Deleting Data:</b>\n\
         - \"Delete row 4\"\n\n\
         <b>Working with Multiple Sheets:</b>\n\
         - \"What sheets do I have access to?\"\n\
         - \"Open https://docs.google.com/spreadsheets/d/...\"\n\
         - \"List all worksheets\"\n\n\
         <b>Tips:</b>\n\
         - Row numbers start at 1 (after header)\n\
         - /clear forgets this chat and closes the opened sheet\n\
         - Just describe what you want in plain English!"
    )
}

/// Run one agent turn and turn the outcome into the text to send.
///
/// The turn runs in its own task, so a panic inside it becomes the generic
/// failure reply instead of taking the handler down.
pub async fn answer(agent: Arc<SheetAgent>, chat_id: i64, user: UserContext, text: String) -> String {
    let user_id = user.user_id;
    let turn = tokio::spawn(async move { agent.process_message(chat_id, &user, &text).await });

    match turn.await {
        Ok(Ok(reply)) => reply,
        Ok(Err(AgentError::Llm(e))) => {
            error!(chat_id, user_id, error = %e, "LLM error");
            LLM_FAILURE_REPLY.to_string()
        }
        Err(e) => {
            error!(chat_id, user_id, error = %e, "Unexpected error handling message");
            GENERIC_FAILURE_REPLY.to_string()
        }
    }
}

/// Start command handler
///
/// # Errors
///
/// Returns an error if the welcome message cannot be sent.
pub async fn start(bot: Bot, msg: Message, agent: Arc<SheetAgent>) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    bot.send_message(msg.chat.id, welcome_text(&agent.service_account_email()))
        .parse_mode(ParseMode::Html)
        .await?;
    info!(user_id, "User started the bot");
    Ok(())
}

/// Help command handler
///
/// # Errors
///
/// Returns an error if the help message cannot be sent.
pub async fn help(bot: Bot, msg: Message, agent: Arc<SheetAgent>) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    bot.send_message(msg.chat.id, help_text(&agent.service_account_email()))
        .parse_mode(ParseMode::Html)
        .await?;
    info!(user_id, "User requested help");
    Ok(())
}

/// Clear context handler
///
/// # Errors
///
/// Returns an error if the confirmation cannot be sent.
pub async fn clear(bot: Bot, msg: Message, agent: Arc<SheetAgent>) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    let chat_id = msg.chat.id.0;

    if agent.sessions().is_busy(&chat_id).await {
        bot.send_message(msg.chat.id, "Still working on your last request, try again when it finishes.")
            .await?;
        return Ok(());
    }

    agent.reset(chat_id).await;
    info!(user_id, chat_id, "Chat history cleared");
    bot.send_message(msg.chat.id, "<b>Chat history cleared.</b>")
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// Text message handler
///
/// # Errors
///
/// Returns an error if the reply cannot be delivered.
pub async fn handle_text(bot: Bot, msg: Message, agent: Arc<SheetAgent>) -> Result<()> {
    let Some(text) = msg.text().map(ToString::to_string) else {
        return Ok(());
    };
    let user = user_context(&msg);
    let user_id = user.user_id;
    let chat_id = msg.chat.id.0;

    info!(
        user_id,
        chat_id,
        user_name = %get_user_name(&msg),
        text = %truncate_str(&text, 100),
        "Received message"
    );

    if let Err(e) = bot.send_chat_action(msg.chat.id, ChatAction::Typing).await {
        debug!(chat_id, error = %e, "Failed to send typing action");
    }

    let started = Instant::now();
    let reply = answer(agent, chat_id, user, text).await;
    send_reply(&bot, msg.chat.id, &reply).await?;

    info!(
        user_id,
        chat_id,
        duration_ms = started.elapsed().as_millis(),
        "Sent response"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_parse() {
        assert_eq!(Command::parse("/start", "sloth_bot").ok(), Some(Command::Start));
        assert_eq!(Command::parse("/help@sloth_bot", "sloth_bot").ok(), Some(Command::Help));
        assert_eq!(Command::parse("/clear", "sloth_bot").ok(), Some(Command::Clear));
        assert!(Command::parse("/stats", "sloth_bot").is_err());
    }

    #[test]
    fn test_texts_include_service_email() {
        let email = "sloth@project.iam.gserviceaccount.com";
        assert!(welcome_text(email).contains("<code>sloth@project.iam.gserviceaccount.com</code>"));
        assert!(help_text(email).contains("<code>sloth@project.iam.gserviceaccount.com</code>"));
        assert!(welcome_text("").contains("<code>the service account</code>"));
    }
}
