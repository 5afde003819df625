use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::permissions::{RolePolicy, DEFAULT_ALLOWED_ROLE_IDS};

pub const DEFAULT_API_BASE_URL: &str = "https://discord.com/api/v10";
pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";
/// `GUILDS` only; interactions carry the member roles we need.
pub const DEFAULT_INTENTS: u64 = 1;

pub const CONFIG_FILE_CANDIDATES: [&str; 2] = ["loa-bot.toml", "config/loa-bot.toml"];

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub discord: DiscordConfig,
    pub loa: LoaConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DiscordConfig {
    pub token: SecretString,
    pub client_id: String,
    pub guild_ids: Vec<String>,
    pub api_base_url: String,
    pub gateway_url: String,
    pub intents: u64,
}

#[derive(Clone, Debug)]
pub struct LoaConfig {
    pub allowed_role_ids: Vec<String>,
    pub review_channel: String,
    pub log_channel: String,
}

impl LoaConfig {
    pub fn role_policy(&self) -> RolePolicy {
        RolePolicy::new(self.allowed_role_ids.iter().cloned())
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub discord_token: Option<String>,
    pub discord_client_id: Option<String>,
    pub discord_guild_ids: Option<Vec<String>>,
    pub discord_api_base_url: Option<String>,
    pub allowed_role_ids: Option<Vec<String>>,
    pub review_channel: Option<String>,
    pub log_channel: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            discord: DiscordConfig {
                token: String::new().into(),
                client_id: String::new(),
                guild_ids: Vec::new(),
                api_base_url: DEFAULT_API_BASE_URL.to_string(),
                gateway_url: DEFAULT_GATEWAY_URL.to_string(),
                intents: DEFAULT_INTENTS,
            },
            loa: LoaConfig {
                allowed_role_ids: DEFAULT_ALLOWED_ROLE_IDS.iter().map(|id| id.to_string()).collect(),
                review_channel: "loa-review".to_string(),
                log_channel: "loa-logs".to_string(),
            },
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), health_check_port: 8080 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options
                .config_path
                .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_CANDIDATES[0]));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(discord) = patch.discord {
            if let Some(discord_token_value) = discord.token {
                self.discord.token = secret_value(discord_token_value);
            }
            if let Some(client_id) = discord.client_id {
                self.discord.client_id = client_id;
            }
            if let Some(guild_ids) = discord.guild_ids {
                self.discord.guild_ids = guild_ids;
            }
            if let Some(api_base_url) = discord.api_base_url {
                self.discord.api_base_url = api_base_url;
            }
            if let Some(gateway_url) = discord.gateway_url {
                self.discord.gateway_url = gateway_url;
            }
            if let Some(intents) = discord.intents {
                self.discord.intents = intents;
            }
        }

        if let Some(loa) = patch.loa {
            if let Some(allowed_role_ids) = loa.allowed_role_ids {
                self.loa.allowed_role_ids = allowed_role_ids;
            }
            if let Some(review_channel) = loa.review_channel {
                self.loa.review_channel = review_channel;
            }
            if let Some(log_channel) = loa.log_channel {
                self.loa.log_channel = log_channel;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("LOA_DISCORD_TOKEN").or_else(|| read_env("DISCORD_TOKEN")) {
            self.discord.token = secret_value(value);
        }
        if let Some(value) = read_env("LOA_DISCORD_CLIENT_ID").or_else(|| read_env("CLIENT_ID")) {
            self.discord.client_id = value.trim().to_string();
        }
        if let Some(value) = read_env("LOA_DISCORD_GUILD_IDS").or_else(|| read_env("GUILD_IDS")) {
            self.discord.guild_ids = split_list(&value);
        }
        if let Some(value) = read_env("LOA_DISCORD_API_BASE_URL") {
            self.discord.api_base_url = value;
        }
        if let Some(value) = read_env("LOA_DISCORD_GATEWAY_URL") {
            self.discord.gateway_url = value;
        }
        if let Some(value) = read_env("LOA_DISCORD_INTENTS") {
            self.discord.intents = parse_u64("LOA_DISCORD_INTENTS", &value)?;
        }

        if let Some(value) = read_env("LOA_ALLOWED_ROLE_IDS") {
            self.loa.allowed_role_ids = split_list(&value);
        }
        if let Some(value) = read_env("LOA_REVIEW_CHANNEL") {
            self.loa.review_channel = value;
        }
        if let Some(value) = read_env("LOA_LOG_CHANNEL") {
            self.loa.log_channel = value;
        }

        if let Some(value) = read_env("LOA_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("LOA_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port = parse_u16("LOA_SERVER_HEALTH_CHECK_PORT", &value)?;
        }

        let log_level = read_env("LOA_LOGGING_LEVEL").or_else(|| read_env("LOA_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("LOA_LOGGING_FORMAT").or_else(|| read_env("LOA_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(discord_token) = overrides.discord_token {
            self.discord.token = secret_value(discord_token);
        }
        if let Some(client_id) = overrides.discord_client_id {
            self.discord.client_id = client_id;
        }
        if let Some(guild_ids) = overrides.discord_guild_ids {
            self.discord.guild_ids = guild_ids;
        }
        if let Some(api_base_url) = overrides.discord_api_base_url {
            self.discord.api_base_url = api_base_url;
        }
        if let Some(allowed_role_ids) = overrides.allowed_role_ids {
            self.loa.allowed_role_ids = allowed_role_ids;
        }
        if let Some(review_channel) = overrides.review_channel {
            self.loa.review_channel = review_channel;
        }
        if let Some(log_channel) = overrides.log_channel {
            self.loa.log_channel = log_channel;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_discord(&self.discord)?;
        validate_loa(&self.loa)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    CONFIG_FILE_CANDIDATES.into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

/// Discord ids are unsigned 64-bit integers rendered as decimal strings.
pub fn is_snowflake(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= 20
        && value.bytes().all(|byte| byte.is_ascii_digit())
        && value.parse::<u64>().is_ok()
}

fn validate_discord(discord: &DiscordConfig) -> Result<(), ConfigError> {
    let token = discord.token.expose_secret();
    if token.trim().is_empty() {
        return Err(ConfigError::Validation(
            "discord.token is required. Get it from https://discord.com/developers/applications > Your App > Bot > Token".to_string(),
        ));
    }
    if token.starts_with("Bot ") {
        return Err(ConfigError::Validation(
            "discord.token must be the raw bot token without the `Bot ` prefix".to_string(),
        ));
    }

    if !is_snowflake(&discord.client_id) {
        return Err(ConfigError::Validation(
            "discord.client_id must be the numeric application id (General Information > Application ID)"
                .to_string(),
        ));
    }

    if discord.guild_ids.is_empty() {
        return Err(ConfigError::Validation(
            "discord.guild_ids must list at least one guild to register commands in".to_string(),
        ));
    }
    if let Some(bad) = discord.guild_ids.iter().find(|id| !is_snowflake(id)) {
        return Err(ConfigError::Validation(format!(
            "discord.guild_ids contains `{bad}`, which is not a numeric guild id"
        )));
    }

    if !discord.api_base_url.starts_with("http://") && !discord.api_base_url.starts_with("https://")
    {
        return Err(ConfigError::Validation(
            "discord.api_base_url must start with http:// or https://".to_string(),
        ));
    }
    if !discord.gateway_url.starts_with("ws://") && !discord.gateway_url.starts_with("wss://") {
        return Err(ConfigError::Validation(
            "discord.gateway_url must start with ws:// or wss://".to_string(),
        ));
    }

    Ok(())
}

fn validate_loa(loa: &LoaConfig) -> Result<(), ConfigError> {
    if loa.allowed_role_ids.is_empty() {
        return Err(ConfigError::Validation(
            "loa.allowed_role_ids must list at least one role permitted to post and review LOAs"
                .to_string(),
        ));
    }
    if let Some(bad) = loa.allowed_role_ids.iter().find(|id| !is_snowflake(id)) {
        return Err(ConfigError::Validation(format!(
            "loa.allowed_role_ids contains `{bad}`, which is not a numeric role id"
        )));
    }

    if loa.review_channel.trim().is_empty() {
        return Err(ConfigError::Validation("loa.review_channel must not be empty".to_string()));
    }
    if loa.log_channel.trim().is_empty() {
        return Err(ConfigError::Validation("loa.log_channel must not be empty".to_string()));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn split_list(value: &str) -> Vec<String> {
    value.split(',').map(str::trim).filter(|item| !item.is_empty()).map(str::to_string).collect()
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    discord: Option<DiscordPatch>,
    loa: Option<LoaPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DiscordPatch {
    token: Option<String>,
    client_id: Option<String>,
    guild_ids: Option<Vec<String>>,
    api_base_url: Option<String>,
    gateway_url: Option<String>,
    intents: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoaPatch {
    allowed_role_ids: Option<Vec<String>>,
    review_channel: Option<String>,
    log_channel: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const DISCORD_VARS: [&str; 9] = [
        "LOA_DISCORD_TOKEN",
        "DISCORD_TOKEN",
        "LOA_DISCORD_CLIENT_ID",
        "CLIENT_ID",
        "LOA_DISCORD_GUILD_IDS",
        "GUILD_IDS",
        "LOA_ALLOWED_ROLE_IDS",
        "LOA_LOG_LEVEL",
        "LOA_LOG_FORMAT",
    ];

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn set_required_vars() {
        env::set_var("LOA_DISCORD_TOKEN", "token-from-env");
        env::set_var("LOA_DISCORD_CLIENT_ID", "1100000000000000001");
        env::set_var("LOA_DISCORD_GUILD_IDS", "1200000000000000001");
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&DISCORD_VARS);

        env::set_var("TEST_LOA_TOKEN", "token-interpolated");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("loa-bot.toml");
            fs::write(
                &path,
                r#"
[discord]
token = "${TEST_LOA_TOKEN}"
client_id = "1100000000000000001"
guild_ids = ["1200000000000000001", "1200000000000000002"]
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.discord.token.expose_secret() == "token-interpolated",
                "token should be interpolated from environment",
            )?;
            ensure(config.discord.guild_ids.len() == 2, "both guild ids should load from file")?;
            Ok(())
        })();

        clear_vars(&["TEST_LOA_TOKEN"]);
        result
    }

    #[test]
    fn legacy_env_names_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&DISCORD_VARS);

        env::set_var("DISCORD_TOKEN", "legacy-token");
        env::set_var("CLIENT_ID", "1100000000000000001");
        env::set_var("GUILD_IDS", "1200000000000000001, 1200000000000000002,");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.discord.token.expose_secret() == "legacy-token", "legacy token alias")?;
            ensure(
                config.discord.guild_ids
                    == vec!["1200000000000000001".to_string(), "1200000000000000002".to_string()],
                "comma separated guild ids should be trimmed and split",
            )?;
            Ok(())
        })();

        clear_vars(&DISCORD_VARS);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&DISCORD_VARS);

        set_required_vars();
        env::set_var("LOA_LOG_LEVEL", "warn");
        env::set_var("LOA_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&DISCORD_VARS);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&DISCORD_VARS);

        set_required_vars();
        env::set_var("LOA_ALLOWED_ROLE_IDS", "1300000000000000001");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("loa-bot.toml");
            fs::write(
                &path,
                r#"
[discord]
token = "token-from-file"

[loa]
allowed_role_ids = ["1300000000000000099"]
review_channel = "leave-review"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    log_channel: Some("leave-audit".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.loa.review_channel == "leave-review", "file should beat defaults")?;
            ensure(config.loa.log_channel == "leave-audit", "override should win")?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.loa.allowed_role_ids == vec!["1300000000000000001".to_string()],
                "env role ids should win over file",
            )?;
            ensure(
                config.discord.token.expose_secret() == "token-from-env",
                "env token should win over file and defaults",
            )?;
            Ok(())
        })();

        clear_vars(&DISCORD_VARS);
        result
    }

    #[test]
    fn defaults_match_deployed_channels_and_roles() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&DISCORD_VARS);
        set_required_vars();

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.loa.review_channel == "loa-review", "default review channel")?;
            ensure(config.loa.log_channel == "loa-logs", "default log channel")?;
            ensure(config.loa.allowed_role_ids.len() == 2, "two default command roles")?;
            ensure(config.discord.intents == 1, "guilds intent only by default")?;
            ensure(
                config.loa.role_policy().check(
                    &["1436508067759001804".to_string()],
                    crate::permissions::Permission::PostForm
                ).is_allowed(),
                "default policy admits SHS Command",
            )?;
            Ok(())
        })();

        clear_vars(&DISCORD_VARS);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&DISCORD_VARS);

        set_required_vars();
        env::set_var("LOA_DISCORD_GUILD_IDS", "not-a-guild");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("discord.guild_ids")
            );
            ensure(has_message, "validation failure should mention discord.guild_ids")
        })();

        clear_vars(&DISCORD_VARS);
        result
    }

    #[test]
    fn missing_token_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&DISCORD_VARS);

        let result = match AppConfig::load(LoadOptions::default()) {
            Ok(_) => Err("config without a token must not load".to_string()),
            Err(ConfigError::Validation(message)) if message.contains("discord.token") => Ok(()),
            Err(other) => Err(format!("unexpected error: {other}")),
        };

        clear_vars(&DISCORD_VARS);
        result
    }

    #[test]
    fn bot_prefixed_token_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&DISCORD_VARS);

        set_required_vars();
        let result = match AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                discord_token: Some("Bot abc.def".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }) {
            Ok(_) => Err("prefixed token must not load".to_string()),
            Err(error) => ensure(error.to_string().contains("`Bot `"), "hint about the prefix"),
        };

        clear_vars(&DISCORD_VARS);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&DISCORD_VARS);

        set_required_vars();
        env::set_var("LOA_DISCORD_TOKEN", "super-secret-token-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(
                !debug.contains("super-secret-token-value"),
                "debug output should not contain the bot token",
            )?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&DISCORD_VARS);
        result
    }

    #[test]
    fn snowflake_check_accepts_only_numeric_ids() {
        assert!(super::is_snowflake("1436508067759001804"));
        assert!(!super::is_snowflake(""));
        assert!(!super::is_snowflake("12a"));
        assert!(!super::is_snowflake("-1"));
    }

    #[test]
    fn signed_ids_are_not_snowflakes() {
        assert!(!super::is_snowflake("+1436508067759001804"));
        assert!(!super::is_snowflake("+123"));
        assert!(!super::is_snowflake(" 123"));
    }

    #[test]
    fn signed_client_id_fails_validation() {
        let mut config = AppConfig::default();
        config.discord.token = "MTEw.GhIjKl.signature".to_string().into();
        config.discord.client_id = "+1100000000000000001".to_string();
        config.discord.guild_ids = vec!["1200000000000000001".to_string()];

        let error = config.validate().expect_err("signed client id should be rejected");
        assert!(error.to_string().contains("discord.client_id"), "unexpected error: {error}");
    }
}
