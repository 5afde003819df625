use std::sync::Arc;

use loa_core::config::{AppConfig, ConfigError};
use loa_discord::api::ApiError;
use loa_discord::channels::GuildChannelDirectory;
use loa_discord::events::loa_dispatcher;
use loa_discord::gateway::{GatewayRunner, GatewayStatus, ReconnectPolicy};
use loa_discord::http::DiscordHttpClient;
use loa_discord::websocket::WebSocketGatewayTransport;
use loa_discord::workflow::{LoaWorkflow, WorkflowSettings};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub api: Arc<DiscordHttpClient>,
    pub gateway_status: Arc<GatewayStatus>,
    pub gateway_runner: GatewayRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("discord client setup failed: {0}")]
    DiscordClient(#[source] ApiError),
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        guild_count = config.discord.guild_ids.len(),
        "starting application bootstrap"
    );
    config.validate()?;

    let api = Arc::new(
        DiscordHttpClient::new(&config.discord.api_base_url, config.discord.token.clone())
            .map_err(BootstrapError::DiscordClient)?,
    );
    let channels = Arc::new(GuildChannelDirectory::new(api.clone()));
    let workflow = Arc::new(LoaWorkflow::new(
        api.clone(),
        channels,
        config.loa.role_policy(),
        WorkflowSettings::from(&config.loa),
    ));
    info!(
        event_name = "system.bootstrap.workflow_ready",
        correlation_id = "bootstrap",
        review_channel = %workflow.settings().review_channel,
        log_channel = %workflow.settings().log_channel,
        "LOA workflow initialized"
    );

    let transport = Arc::new(WebSocketGatewayTransport::new(
        &config.discord.gateway_url,
        config.discord.token.clone(),
        config.discord.intents,
    ));
    let gateway_status = Arc::new(GatewayStatus::default());
    let gateway_runner = GatewayRunner::new(
        transport,
        loa_dispatcher(workflow),
        ReconnectPolicy::default(),
        gateway_status.clone(),
    );

    Ok(Application { config, api, gateway_status, gateway_runner })
}
