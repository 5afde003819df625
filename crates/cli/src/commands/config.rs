use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use loa_core::config::{resolve_config_path, AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

struct ConfigSource {
    path: Option<PathBuf>,
    doc: Option<Value>,
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    render(&config, &ConfigSource::detect())
}

fn render(config: &AppConfig, source: &ConfigSource) -> String {
    let token = redact_token(config.discord.token.expose_secret());
    let entries: [(&str, &[&str], String); 13] = [
        ("discord.token", &["LOA_DISCORD_TOKEN", "DISCORD_TOKEN"], token),
        (
            "discord.client_id",
            &["LOA_DISCORD_CLIENT_ID", "CLIENT_ID"],
            config.discord.client_id.clone(),
        ),
        (
            "discord.guild_ids",
            &["LOA_DISCORD_GUILD_IDS", "GUILD_IDS"],
            config.discord.guild_ids.join(","),
        ),
        (
            "discord.api_base_url",
            &["LOA_DISCORD_API_BASE_URL"],
            config.discord.api_base_url.clone(),
        ),
        ("discord.gateway_url", &["LOA_DISCORD_GATEWAY_URL"], config.discord.gateway_url.clone()),
        ("discord.intents", &["LOA_DISCORD_INTENTS"], config.discord.intents.to_string()),
        ("loa.allowed_role_ids", &["LOA_ALLOWED_ROLE_IDS"], config.loa.allowed_role_ids.join(",")),
        ("loa.review_channel", &["LOA_REVIEW_CHANNEL"], config.loa.review_channel.clone()),
        ("loa.log_channel", &["LOA_LOG_CHANNEL"], config.loa.log_channel.clone()),
        ("server.bind_address", &["LOA_SERVER_BIND_ADDRESS"], config.server.bind_address.clone()),
        (
            "server.health_check_port",
            &["LOA_SERVER_HEALTH_CHECK_PORT"],
            config.server.health_check_port.to_string(),
        ),
        ("logging.level", &["LOA_LOGGING_LEVEL", "LOA_LOG_LEVEL"], config.logging.level.clone()),
        (
            "logging.format",
            &["LOA_LOGGING_FORMAT", "LOA_LOG_FORMAT"],
            format!("{:?}", config.logging.format).to_lowercase(),
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, env_keys, value) in entries {
        lines.push(render_line(key, &value, source.attribute(key, env_keys)));
    }
    lines.join("\n")
}

impl ConfigSource {
    fn detect() -> Self {
        let path = resolve_config_path(None);
        let doc = load_config_file_doc(path.as_deref());
        Self { path, doc }
    }

    fn attribute(&self, key_path: &str, env_keys: &[&str]) -> String {
        if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
            return format!("env ({env_key})");
        }

        if let Some(doc) = &self.doc {
            if contains_path(doc, key_path) {
                let file_path = self
                    .path
                    .as_ref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "config file".to_string());
                return format!("file ({file_path})");
            }
        }

        "default".to_string()
    }
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Discord tokens are three dot-separated segments; only the first (the encoded bot id) is shown.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    match trimmed.split_once('.') {
        Some((bot_id, _)) if !bot_id.is_empty() => format!("{bot_id}.***"),
        _ => "<redacted>".to_string(),
    }
}
