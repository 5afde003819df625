use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::api::{ApiError, DiscordApi, GuildChannel};

pub const DEFAULT_CHANNEL_CACHE_TTL: Duration = Duration::from_secs(60);

/// Looks up a guild channel by its exact name.
#[async_trait]
pub trait ChannelResolver: Send + Sync {
    async fn resolve(&self, guild_id: &str, name: &str) -> Result<Option<String>, ApiError>;
}

struct CachedChannels {
    fetched_at: Instant,
    channels: Vec<GuildChannel>,
}

/// Resolves names against the guild's channel list, fetched at most once per `ttl` per guild.
/// Failed fetches are not cached.
pub struct GuildChannelDirectory {
    api: Arc<dyn DiscordApi>,
    ttl: Duration,
    cache: Mutex<HashMap<String, CachedChannels>>,
}

impl GuildChannelDirectory {
    pub fn new(api: Arc<dyn DiscordApi>) -> Self {
        Self::with_ttl(api, DEFAULT_CHANNEL_CACHE_TTL)
    }

    pub fn with_ttl(api: Arc<dyn DiscordApi>, ttl: Duration) -> Self {
        Self { api, ttl, cache: Mutex::new(HashMap::new()) }
    }

    async fn channels(&self, guild_id: &str) -> Result<Vec<GuildChannel>, ApiError> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.get(guild_id) {
            if cached.fetched_at.elapsed() < self.ttl {
                return Ok(cached.channels.clone());
            }
        }

        let channels = self.api.guild_channels(guild_id).await?;
        cache.insert(
            guild_id.to_owned(),
            CachedChannels { fetched_at: Instant::now(), channels: channels.clone() },
        );
        Ok(channels)
    }
}

#[async_trait]
impl ChannelResolver for GuildChannelDirectory {
    async fn resolve(&self, guild_id: &str, name: &str) -> Result<Option<String>, ApiError> {
        let channels = self.channels(guild_id).await?;
        Ok(channels
            .into_iter()
            .find(|channel| channel.is_text_based() && channel.name == name)
            .map(|channel| channel.id))
    }
}

/// Fixed name to id map, shared by every guild.
#[derive(Clone, Debug, Default)]
pub struct StaticChannelRegistry {
    channels: HashMap<String, String>,
}

impl StaticChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channel(mut self, name: impl Into<String>, channel_id: impl Into<String>) -> Self {
        self.channels.insert(name.into(), channel_id.into());
        self
    }
}

#[async_trait]
impl ChannelResolver for StaticChannelRegistry {
    async fn resolve(&self, _guild_id: &str, name: &str) -> Result<Option<String>, ApiError> {
        Ok(self.channels.get(name).cloned())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::{ChannelResolver, GuildChannelDirectory, StaticChannelRegistry};
    use crate::api::{ApiError, DiscordApi, GuildChannel, InteractionRef, SentMessage};
    use crate::commands::CommandDefinition;
    use crate::components::{InteractionResponse, MessageTemplate};

    struct ChannelListApi {
        channels: Result<Vec<GuildChannel>, ApiError>,
        fetches: AtomicUsize,
    }

    impl ChannelListApi {
        fn new(channels: Result<Vec<GuildChannel>, ApiError>) -> Self {
            Self { channels, fetches: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl DiscordApi for ChannelListApi {
        async fn respond(
            &self,
            _interaction: &InteractionRef,
            _response: &InteractionResponse,
        ) -> Result<(), ApiError> {
            Ok(())
        }

        async fn send_message(
            &self,
            channel_id: &str,
            _message: &MessageTemplate,
        ) -> Result<SentMessage, ApiError> {
            Ok(SentMessage { id: "1".to_owned(), channel_id: channel_id.to_owned() })
        }

        async fn edit_message(
            &self,
            _channel_id: &str,
            _message_id: &str,
            _message: &MessageTemplate,
        ) -> Result<(), ApiError> {
            Ok(())
        }

        async fn guild_channels(&self, _guild_id: &str) -> Result<Vec<GuildChannel>, ApiError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.channels.clone()
        }

        async fn register_guild_commands(
            &self,
            _application_id: &str,
            _guild_id: &str,
            _commands: &[CommandDefinition],
        ) -> Result<(), ApiError> {
            Ok(())
        }
    }

    fn channel(id: &str, name: &str, kind: u8) -> GuildChannel {
        GuildChannel { id: id.to_owned(), name: name.to_owned(), kind }
    }

    #[tokio::test]
    async fn directory_picks_text_channel_with_exact_name() {
        let directory = GuildChannelDirectory::new(Arc::new(ChannelListApi::new(Ok(vec![
            channel("10", "loa-review", 4),
            channel("11", "LOA-review", 0),
            channel("12", "loa-review", 0),
            channel("13", "loa-review", 0),
        ]))));

        let resolved = directory.resolve("g1", "loa-review").await.expect("resolve");
        assert_eq!(resolved.as_deref(), Some("12"));
    }

    #[tokio::test]
    async fn directory_returns_none_when_absent() {
        let directory = GuildChannelDirectory::new(Arc::new(ChannelListApi::new(Ok(vec![
            channel("10", "general", 0),
        ]))));

        assert_eq!(directory.resolve("g1", "loa-logs").await.expect("resolve"), None);
    }

    #[tokio::test]
    async fn directory_propagates_api_failures() {
        let api = Arc::new(ChannelListApi::new(Err(ApiError::Status {
            status: 403,
            body: "Missing Access".to_owned(),
        })));
        let directory = GuildChannelDirectory::new(api.clone());

        let error = directory.resolve("g1", "loa-review").await.expect_err("forbidden");
        assert!(matches!(error, ApiError::Status { status: 403, .. }));
        assert!(directory.resolve("g1", "loa-review").await.is_err());
        assert_eq!(api.fetches.load(Ordering::SeqCst), 2, "failures are not cached");
    }

    #[tokio::test]
    async fn directory_fetches_each_guild_once_within_ttl() {
        let api = Arc::new(ChannelListApi::new(Ok(vec![
            channel("12", "loa-review", 0),
            channel("14", "loa-logs", 0),
        ])));
        let directory = GuildChannelDirectory::new(api.clone());

        assert_eq!(directory.resolve("g1", "loa-review").await, Ok(Some("12".to_owned())));
        assert_eq!(directory.resolve("g1", "loa-logs").await, Ok(Some("14".to_owned())));
        assert_eq!(api.fetches.load(Ordering::SeqCst), 1);

        directory.resolve("g2", "loa-review").await.expect("second guild");
        assert_eq!(api.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn expired_cache_entry_is_refetched() {
        let api = Arc::new(ChannelListApi::new(Ok(vec![channel("12", "loa-review", 0)])));
        let directory = GuildChannelDirectory::with_ttl(api.clone(), Duration::ZERO);

        directory.resolve("g1", "loa-review").await.expect("first");
        directory.resolve("g1", "loa-review").await.expect("second");
        assert_eq!(api.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn static_registry_maps_names_for_any_guild() {
        let registry = StaticChannelRegistry::new().with_channel("loa-review", "500");

        assert_eq!(registry.resolve("g1", "loa-review").await, Ok(Some("500".to_owned())));
        assert_eq!(registry.resolve("g2", "loa-review").await, Ok(Some("500".to_owned())));
        assert_eq!(registry.resolve("g1", "loa-logs").await, Ok(None));
    }
}
