use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::api::{ApiError, DiscordApi, GuildChannel, InteractionRef, SentMessage};
use crate::commands::CommandDefinition;
use crate::components::{InteractionResponse, MessageTemplate};

const USER_AGENT: &str = concat!("DiscordBot (loa-bot, ", env!("CARGO_PKG_VERSION"), ")");
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// REST client for the Discord HTTP API. No retries; rate limits surface as status errors.
#[derive(Clone)]
pub struct DiscordHttpClient {
    client: Client,
    base_url: String,
    token: SecretString,
}

impl DiscordHttpClient {
    pub fn new(base_url: impl Into<String>, token: SecretString) -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|error| ApiError::Transport(error.to_string()))?;

        Ok(Self { client, base_url: base_url.into().trim_end_matches('/').to_owned(), token })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request
            .header("Authorization", format!("Bot {}", self.token.expose_secret()))
            .send()
            .await
            .map_err(|error| ApiError::Transport(error.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ApiError::Status { status: status.as_u16(), body })
    }
}

#[async_trait]
impl DiscordApi for DiscordHttpClient {
    async fn respond(
        &self,
        interaction: &InteractionRef,
        response: &InteractionResponse,
    ) -> Result<(), ApiError> {
        let url =
            self.url(&format!("interactions/{}/{}/callback", interaction.id, interaction.token));
        self.execute(self.client.post(url).json(&response.to_callback())).await?;
        debug!(interaction_id = %interaction.id, "sent interaction callback");
        Ok(())
    }

    async fn send_message(
        &self,
        channel_id: &str,
        message: &MessageTemplate,
    ) -> Result<SentMessage, ApiError> {
        let url = self.url(&format!("channels/{channel_id}/messages"));
        let response = self.execute(self.client.post(url).json(message)).await?;
        response.json::<SentMessage>().await.map_err(|error| ApiError::Decode(error.to_string()))
    }

    async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        message: &MessageTemplate,
    ) -> Result<(), ApiError> {
        let url = self.url(&format!("channels/{channel_id}/messages/{message_id}"));
        self.execute(self.client.patch(url).json(message)).await?;
        Ok(())
    }

    async fn guild_channels(&self, guild_id: &str) -> Result<Vec<GuildChannel>, ApiError> {
        let url = self.url(&format!("guilds/{guild_id}/channels"));
        let response = self.execute(self.client.get(url)).await?;
        response
            .json::<Vec<GuildChannel>>()
            .await
            .map_err(|error| ApiError::Decode(error.to_string()))
    }

    async fn register_guild_commands(
        &self,
        application_id: &str,
        guild_id: &str,
        commands: &[CommandDefinition],
    ) -> Result<(), ApiError> {
        let url = self.url(&format!("applications/{application_id}/guilds/{guild_id}/commands"));
        self.execute(self.client.put(url).json(commands)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::DiscordHttpClient;

    #[test]
    fn joins_paths_against_base_without_double_slashes() {
        let client = DiscordHttpClient::new(
            "https://discord.com/api/v10/",
            SecretString::from("token".to_owned()),
        )
        .expect("client");

        assert_eq!(
            client.url("/channels/1/messages"),
            "https://discord.com/api/v10/channels/1/messages"
        );
        assert_eq!(
            client.url("guilds/2/channels"),
            "https://discord.com/api/v10/guilds/2/channels"
        );
    }

    #[test]
    fn user_agent_follows_discord_bot_format() {
        assert!(super::USER_AGENT.starts_with("DiscordBot ("));
        assert!(super::USER_AGENT.ends_with(')'));
    }
}
