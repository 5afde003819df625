use std::sync::Arc;

use anyhow::Context;
use loa_core::config::{AppConfig, LoadOptions};
use loa_discord::api::DiscordApi;
use loa_discord::commands::{register_commands, RegistrationReport};
use loa_discord::http::DiscordHttpClient;

use super::CommandResult;

const COMMAND: &str = "register";

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(COMMAND, "config_validation", error.to_string(), 2)
        }
    };

    match register(&config) {
        Ok(report) => outcome(&report),
        Err(error) => CommandResult::failure(COMMAND, "runtime", format!("{error:#}"), 1),
    }
}

fn register(config: &AppConfig) -> anyhow::Result<RegistrationReport> {
    let client = DiscordHttpClient::new(&config.discord.api_base_url, config.discord.token.clone())
        .context("failed to build Discord client")?;
    let api: Arc<dyn DiscordApi> = Arc::new(client);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to initialize async runtime")?;

    Ok(runtime.block_on(register_commands(
        api.as_ref(),
        &config.discord.client_id,
        &config.discord.guild_ids,
    )))
}

fn outcome(report: &RegistrationReport) -> CommandResult {
    if report.is_complete() {
        return CommandResult::success(
            COMMAND,
            format!("registered slash commands in {} guild(s)", report.registered.len()),
        );
    }

    let failures = report
        .failed
        .iter()
        .map(|failure| format!("{}: {}", failure.guild_id, failure.error))
        .collect::<Vec<_>>()
        .join("; ");
    CommandResult::failure(
        COMMAND,
        "discord_api",
        format!(
            "registered in {} guild(s), failed in {}: {failures}",
            report.registered.len(),
            report.failed.len()
        ),
        1,
    )
}
