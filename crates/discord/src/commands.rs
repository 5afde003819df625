use serde::Serialize;
use tracing::{info, warn};

use crate::api::DiscordApi;
use crate::components::POST_LOA_COMMAND;

const CHAT_INPUT: u8 = 1;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommandDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: u8,
}

impl CommandDefinition {
    pub fn chat_input(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self { name: name.into(), description: description.into(), kind: CHAT_INPUT }
    }
}

/// The slash commands this bot owns.
pub fn loa_commands() -> Vec<CommandDefinition> {
    vec![CommandDefinition::chat_input(
        POST_LOA_COMMAND,
        "Post the persistent LOA submission message.",
    )]
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegistrationReport {
    pub registered: Vec<String>,
    pub failed: Vec<GuildFailure>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuildFailure {
    pub guild_id: String,
    pub error: String,
}

impl RegistrationReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Overwrites the guild command set in every guild. A failing guild does not stop the rest.
pub async fn register_commands(
    api: &dyn DiscordApi,
    application_id: &str,
    guild_ids: &[String],
) -> RegistrationReport {
    let commands = loa_commands();
    let mut report = RegistrationReport::default();

    for guild_id in guild_ids {
        match api.register_guild_commands(application_id, guild_id, &commands).await {
            Ok(()) => {
                info!(
                    event_name = "system.commands.registered",
                    guild_id = %guild_id,
                    command_count = commands.len(),
                    "registered slash commands"
                );
                report.registered.push(guild_id.clone());
            }
            Err(error) => {
                warn!(
                    event_name = "system.commands.registration_failed",
                    guild_id = %guild_id,
                    error = %error,
                    "failed to register slash commands"
                );
                report
                    .failed
                    .push(GuildFailure { guild_id: guild_id.clone(), error: error.to_string() });
            }
        }
    }

    report
}
