use crate::bot;
use crate::bot::handlers::{get_user_id_safe, get_user_name, Command, ACCESS_DENIED_REPLY};
use crate::bot::resilient::send_message_resilient;
use crate::bot::UnauthorizedCache;
use crate::config::{
    get_unauthorized_cache_max_size, get_unauthorized_cache_ttl, get_unauthorized_cooldown,
    AllowList, BotSettings,
};
use opensloth_core::agent::SheetAgent;
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::error_handlers::LoggingErrorHandler;
use teloxide::prelude::*;
use teloxide::update_listeners::Polling;
use teloxide::utils::command::BotCommands;
use tracing::{error, info, warn};

/// Run the Telegram transport until Ctrl-C.
///
/// Pending updates are dropped at startup.
pub async fn run_bot(settings: Arc<BotSettings>, agent: Arc<SheetAgent>) {
    let bot = Bot::new(settings.telegram.telegram_bot_token.clone());

    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!(error = %e, "Failed to register the command menu");
    }

    let allow_list = init_allow_list(&settings);
    let unauthorized_cache = init_unauthorized_cache();
    let handler = setup_handler();

    let listener = Polling::builder(bot.clone())
        .timeout(settings.telegram.poll_timeout())
        .drop_pending_updates()
        .build();

    info!(
        poll_timeout_secs = settings.telegram.poll_timeout().as_secs(),
        "Bot is now running and polling for messages"
    );

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![agent, allow_list, unauthorized_cache])
        .enable_ctrlc_handler()
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("An error from the update listener"),
        )
        .await;
}

fn init_allow_list(settings: &BotSettings) -> Arc<AllowList> {
    let allow_list = settings.telegram.allowed_users();
    if allow_list.is_empty() {
        warn!("ALLOWED_USERS is empty, every Telegram user can use the bot");
    } else {
        info!(entries = allow_list.len(), "Allow-list loaded");
    }
    Arc::new(allow_list)
}

fn init_unauthorized_cache() -> Arc<UnauthorizedCache> {
    let cooldown = get_unauthorized_cooldown();
    let ttl = get_unauthorized_cache_ttl();
    let max_size = get_unauthorized_cache_max_size();

    info!(
        cooldown_secs = cooldown,
        ttl_secs = ttl,
        max_size,
        "Initializing UnauthorizedCache"
    );

    Arc::new(UnauthorizedCache::new(cooldown, ttl, max_size))
}

fn is_sender_allowed(msg: &Message, allow_list: &AllowList) -> bool {
    let username = msg.from.as_ref().and_then(|u| u.username.as_deref());
    allow_list.is_allowed(get_user_id_safe(msg), username)
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(
            Update::filter_message().branch(
                dptree::filter(|msg: Message, allow_list: Arc<AllowList>| {
                    is_sender_allowed(&msg, &allow_list)
                })
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(handle_command),
                )
                .branch(
                    dptree::filter(|msg: Message| msg.text().is_some())
                        .endpoint(handle_text_message),
                ),
            ),
        )
        .branch(
            Update::filter_message()
                .filter(|msg: Message, allow_list: Arc<AllowList>| {
                    !is_sender_allowed(&msg, &allow_list)
                })
                .endpoint(handle_unauthorized),
        )
}

async fn handle_unauthorized(
    bot: Bot,
    msg: Message,
    cache: Arc<UnauthorizedCache>,
) -> Result<(), teloxide::RequestError> {
    let user_id = get_user_id_safe(&msg);
    let user_name = get_user_name(&msg);

    if cache.try_claim(user_id, &user_name).await {
        warn!(user_id, user_name = %user_name, "Access denied, sending denial message");

        if let Err(e) = send_message_resilient(&bot, msg.chat.id, ACCESS_DENIED_REPLY, None).await
        {
            error!(user_id, error = %e, "Failed to send access denied message");
            cache.release(user_id).await;
        }
    }

    respond(())
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    agent: Arc<SheetAgent>,
) -> Result<(), teloxide::RequestError> {
    let res = match cmd {
        Command::Start => bot::handlers::start(bot, msg, agent).await,
        Command::Help => bot::handlers::help(bot, msg, agent).await,
        Command::Clear => bot::handlers::clear(bot, msg, agent).await,
    };
    if let Err(e) = res {
        error!(error = %e, "Command error");
    }
    respond(())
}

async fn handle_text_message(
    bot: Bot,
    msg: Message,
    agent: Arc<SheetAgent>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot::handlers::handle_text(bot, msg, agent).await {
        error!(error = %e, "Text handler error");
    }
    respond(())
}
