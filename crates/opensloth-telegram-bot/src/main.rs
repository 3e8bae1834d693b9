mod logging;

use dotenvy::dotenv;
use logging::{init_logging, RedactionPatterns};
use opensloth_core::agent::{AgentOptions, SheetAgent};
use opensloth_core::config::AgentSettings;
use opensloth_core::llm::{create_provider, LlmProvider};
use opensloth_core::sheets::{GoogleSheetsClient, SheetsApi};
use opensloth_transport_telegram::config::{BotSettings, TelegramSettings};
use opensloth_transport_telegram::runner::run_bot;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenv().ok();

    let agent_settings = AgentSettings::new();
    let telegram_settings = TelegramSettings::new();

    // Initialize redaction patterns early (before logging)
    let patterns = Arc::new(
        RedactionPatterns::new(collect_secrets(
            agent_settings.as_ref().ok(),
            telegram_settings.as_ref().ok(),
        ))
        .map_err(|e| {
            eprintln!("Failed to compile regex patterns: {e}");
            e
        })?,
    );
    let log_level = agent_settings
        .as_ref()
        .map_or_else(|_| "info".to_string(), |s| s.log_level.clone());
    init_logging(patterns, &log_level);

    info!("Starting OpenSloth Telegram bot...");

    let settings = init_settings(agent_settings, telegram_settings);
    let llm = init_llm(&settings.agent);
    let sheets = init_sheets(&settings.agent).await;

    let agent = Arc::new(SheetAgent::new(
        llm,
        sheets,
        AgentOptions::from_settings(&settings.agent),
    ));
    info!(
        service_account = %agent.service_account_email(),
        "Share spreadsheets with the service account to give the bot access"
    );

    run_bot(settings, agent).await;

    info!("Bot stopped");
    Ok(())
}

fn collect_secrets(
    agent: Option<&AgentSettings>,
    telegram: Option<&TelegramSettings>,
) -> Vec<String> {
    let mut secrets = Vec::new();
    if let Some(agent) = agent {
        secrets.extend(agent.api_key().map(ToString::to_string));
    }
    if let Some(telegram) = telegram {
        secrets.push(telegram.telegram_bot_token.clone());
    }
    secrets
}

fn init_settings<E: std::fmt::Display>(
    agent_settings: Result<AgentSettings, E>,
    telegram_settings: Result<TelegramSettings, E>,
) -> Arc<BotSettings> {
    let agent_settings = match agent_settings {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load agent configuration: {}", e);
            std::process::exit(1);
        }
    };
    let telegram_settings = match telegram_settings {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load telegram configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        provider = %agent_settings.llm_provider,
        model = %agent_settings.model(),
        default_sheet = agent_settings.default_spreadsheet().is_some(),
        "Configuration loaded successfully."
    );
    Arc::new(BotSettings::new(agent_settings, telegram_settings))
}

fn init_llm(settings: &AgentSettings) -> Arc<dyn LlmProvider> {
    match create_provider(settings) {
        Ok(provider) => {
            info!(
                provider = provider.name(),
                model = %provider.model(),
                "LLM provider initialized."
            );
            provider
        }
        Err(e) => {
            error!("Failed to initialize LLM provider: {}", e);
            std::process::exit(1);
        }
    }
}

async fn init_sheets(settings: &AgentSettings) -> Arc<dyn SheetsApi> {
    let client = match GoogleSheetsClient::new(&settings.google_credentials_file) {
        Ok(client) => client,
        Err(e) => {
            error!(
                credentials = %settings.google_credentials_file,
                "Failed to initialize Google Sheets client: {}", e
            );
            std::process::exit(1);
        }
    };

    if let Err(e) = client.health_check(settings.default_spreadsheet()).await {
        error!("Google Sheets health check failed: {}", e);
        std::process::exit(1);
    }

    info!(
        service_account = %client.service_account_email(),
        "Google Sheets client initialized."
    );
    Arc::new(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_secrets() {
        let agent = AgentSettings {
            llm_api_key: Some("sk-live-123456789".to_string()),
            ..AgentSettings::default()
        };
        let telegram = TelegramSettings {
            telegram_bot_token: "123456789:token".to_string(),
            ..TelegramSettings::default()
        };

        let secrets = collect_secrets(Some(&agent), Some(&telegram));
        assert_eq!(secrets, vec!["sk-live-123456789", "123456789:token"]);
        assert!(collect_secrets(None, None).is_empty());
    }
}
