use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::commands::CommandDefinition;
use crate::components::{InteractionResponse, MessageTemplate};

/// Channel types that accept regular messages: guild text, voice, announcement,
/// the three thread kinds and stage.
const TEXT_BASED_CHANNEL_TYPES: [u8; 7] = [0, 2, 5, 10, 11, 12, 13];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("discord request failed: {0}")]
    Transport(String),
    #[error("discord responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("discord response could not be decoded: {0}")]
    Decode(String),
}

/// Identity of an interaction, enough to send its callback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InteractionRef {
    pub id: String,
    pub token: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SentMessage {
    pub id: String,
    pub channel_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildChannel {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: u8,
}

impl GuildChannel {
    pub fn is_text_based(&self) -> bool {
        TEXT_BASED_CHANNEL_TYPES.contains(&self.kind)
    }
}

#[async_trait]
pub trait DiscordApi: Send + Sync {
    async fn respond(
        &self,
        interaction: &InteractionRef,
        response: &InteractionResponse,
    ) -> Result<(), ApiError>;

    async fn send_message(
        &self,
        channel_id: &str,
        message: &MessageTemplate,
    ) -> Result<SentMessage, ApiError>;

    async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        message: &MessageTemplate,
    ) -> Result<(), ApiError>;

    async fn guild_channels(&self, guild_id: &str) -> Result<Vec<GuildChannel>, ApiError>;

    async fn register_guild_commands(
        &self,
        application_id: &str,
        guild_id: &str,
        commands: &[CommandDefinition],
    ) -> Result<(), ApiError>;
}

#[cfg(test)]
mod tests {
    use super::GuildChannel;

    #[test]
    fn text_based_covers_threads_and_excludes_categories() {
        let channel = |kind| GuildChannel { id: "1".to_owned(), name: "loa-review".to_owned(), kind };

        assert!(channel(0).is_text_based());
        assert!(channel(11).is_text_based());
        assert!(!channel(4).is_text_based(), "category");
        assert!(!channel(15).is_text_based(), "forum");
    }

    #[test]
    fn guild_channel_decodes_from_rest_payload() {
        let channel: GuildChannel = serde_json::from_str(
            r#"{"id":"900","type":0,"name":"loa-logs","guild_id":"1","position":3}"#,
        )
        .expect("decode");
        assert_eq!(channel.name, "loa-logs");
        assert!(channel.is_text_based());
    }
}
