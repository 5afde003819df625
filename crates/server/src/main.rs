mod bootstrap;
mod health;

use anyhow::Result;
use loa_core::config::{AppConfig, LoadOptions};
use loa_discord::commands::register_commands;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(config: &AppConfig) {
    use loa_core::config::LogFormat::*;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    dotenv::dotenv().ok();

    // Logging is configured from the same config the bootstrap uses.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config)?;

    let report = register_commands(
        app.api.as_ref(),
        &app.config.discord.client_id,
        &app.config.discord.guild_ids,
    )
    .await;
    if !report.is_complete() {
        warn!(
            event_name = "system.server.commands_incomplete",
            correlation_id = "bootstrap",
            registered = report.registered.len(),
            failed = report.failed.len(),
            "slash commands missing in some guilds"
        );
    }

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.gateway_status.clone(),
    )
    .await?;

    info!(event_name = "system.server.started", correlation_id = "bootstrap", "loa-bot started");

    tokio::select! {
        outcome = app.gateway_runner.start() => {
            match outcome {
                Ok(()) => info!(
                    event_name = "system.server.gateway_closed",
                    correlation_id = "gateway",
                    "gateway stream closed"
                ),
                Err(error) => error!(
                    event_name = "system.server.gateway_stopped",
                    correlation_id = "gateway",
                    error = %error,
                    "gateway stopped; health endpoint stays up and reports degraded"
                ),
            }
            wait_for_shutdown().await?;
        }
        signal = wait_for_shutdown() => signal?,
    }

    info!(event_name = "system.server.stopping", correlation_id = "shutdown", "loa-bot stopping");
    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
