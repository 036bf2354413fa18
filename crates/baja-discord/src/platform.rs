//! [`ChatPlatform`] over the Discord REST API.
//!
//! Only `Arc<Http>` is needed, so the platform can be built before the
//! gateway connects and keeps working across reconnects.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use baja_core::platform::ArchiveVisibility;
use baja_core::types::{
    ChatAttachment, ChatMessage, GuildInfo, SourceInfo, SourceKind, ThreadInfo,
};
use baja_core::{ChatPlatform, PlatformError};
use chrono::{DateTime, TimeZone, Utc};
use dashmap::DashMap;
use serenity::builder::GetMessages;
use serenity::http::{Http, HttpError};
use serenity::model::channel::{Channel, ChannelType, GuildChannel, Message};
use serenity::model::id::{ChannelId, GuildId, MessageId, UserId};
use tracing::{debug, warn};

/// Milliseconds between the Unix epoch and the first snowflake.
const DISCORD_EPOCH_MS: i64 = 1_420_070_400_000;

/// Max messages Discord returns per history request.
const PAGE_SIZE: usize = 100;

/// Archived threads requested per listing page.
const ARCHIVE_PAGE: u64 = 100;

/// How long a looked-up nickname is trusted.
const NICKNAME_TTL: Duration = Duration::from_secs(3600);

/// Cache size past which expired nicknames are swept on insert.
const NICKNAME_SWEEP_AT: usize = 10_000;

/// A cached nickname, stamped with when it was looked up.
#[derive(Debug, Clone)]
struct CachedNick {
    nick: Option<String>,
    fetched: Instant,
}

impl CachedNick {
    fn is_fresh(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.fetched) < NICKNAME_TTL
    }
}

/// Cursor for the next archived-thread page: the oldest archive time (unix
/// seconds) on the current one. `None` when no thread carries a timestamp.
pub fn archive_cursor(stamps: impl IntoIterator<Item = Option<i64>>) -> Option<u64> {
    stamps
        .into_iter()
        .flatten()
        .min()
        .map(|secs| secs.max(0) as u64)
}

/// Creation time encoded in a snowflake id.
pub fn snowflake_time(id: u64) -> DateTime<Utc> {
    let ms = (id >> 22) as i64 + DISCORD_EPOCH_MS;
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}

/// Largest snowflake created strictly before `at`, for `after=` paging.
pub fn snowflake_before(at: DateTime<Utc>) -> u64 {
    let ms = (at.timestamp_millis() - DISCORD_EPOCH_MS).max(0) as u64;
    (ms << 22).saturating_sub(1).max(1)
}

fn source_kind(kind: ChannelType) -> SourceKind {
    match kind {
        ChannelType::Text | ChannelType::News => SourceKind::Text,
        ChannelType::PublicThread | ChannelType::PrivateThread | ChannelType::NewsThread => {
            SourceKind::Thread
        }
        ChannelType::Category => SourceKind::Category,
        _ => SourceKind::Other,
    }
}

pub(crate) fn source_info(channel: &GuildChannel) -> SourceInfo {
    SourceInfo {
        id: channel.id.get(),
        guild_id: channel.guild_id.get(),
        name: channel.name.clone(),
        kind: source_kind(channel.kind),
        parent_id: channel.parent_id.map(|p| p.get()),
    }
}

fn thread_info(channel: &GuildChannel) -> ThreadInfo {
    ThreadInfo {
        id: channel.id.get(),
        name: channel.name.clone(),
        parent_id: channel.parent_id.map(|p| p.get()).unwrap_or_default(),
    }
}

fn to_chat_message(msg: &Message, source: &SourceInfo, author_name: String) -> ChatMessage {
    ChatMessage {
        id: msg.id.get(),
        source_id: source.id,
        source_name: source.name.clone(),
        in_thread: source.kind == SourceKind::Thread,
        author_name,
        author_is_bot: msg.author.bot,
        content: msg.content.clone(),
        attachments: msg
            .attachments
            .iter()
            .map(|a| ChatAttachment {
                url: a.url.clone(),
                content_type: a.content_type.clone(),
            })
            .collect(),
        created_at: snowflake_time(msg.id.get()),
    }
}

pub(crate) fn map_err(e: serenity::Error) -> PlatformError {
    if let serenity::Error::Http(HttpError::UnsuccessfulRequest(resp)) = &e {
        let message = resp.error.message.clone();
        match resp.status_code.as_u16() {
            403 => return PlatformError::PermissionDenied(message),
            404 => return PlatformError::NotFound(message),
            _ => {}
        }
    }
    PlatformError::Request(e.to_string())
}

pub struct SerenityPlatform {
    http: Arc<Http>,
    /// Guild nicknames by (guild, user), refreshed after [`NICKNAME_TTL`].
    nicknames: DashMap<(u64, u64), CachedNick>,
}

impl SerenityPlatform {
    pub fn new(http: Arc<Http>) -> Self {
        Self {
            http,
            nicknames: DashMap::new(),
        }
    }

    pub fn http(&self) -> &Arc<Http> {
        &self.http
    }

    /// Text channels filed under `category_id`, in sidebar order.
    pub async fn category_channels(
        &self,
        guild_id: u64,
        category_id: u64,
    ) -> Result<Vec<SourceInfo>, PlatformError> {
        let channels = GuildId::new(guild_id)
            .channels(&self.http)
            .await
            .map_err(map_err)?;

        let mut children: Vec<&GuildChannel> = channels
            .values()
            .filter(|c| c.parent_id.map(|p| p.get()) == Some(category_id))
            .filter(|c| source_kind(c.kind) == SourceKind::Text)
            .collect();
        children.sort_by_key(|c| (c.position, c.id));
        Ok(children.into_iter().map(source_info).collect())
    }

    async fn nickname(&self, guild_id: u64, user_id: UserId) -> Option<String> {
        let key = (guild_id, user_id.get());
        let now = Instant::now();
        if let Some(hit) = self.nicknames.get(&key) {
            if hit.is_fresh(now) {
                return hit.nick.clone();
            }
        }
        let nick = match GuildId::new(guild_id).member(&self.http, user_id).await {
            Ok(member) => member.nick,
            Err(e) => {
                debug!(guild_id, user_id = user_id.get(), error = %e, "member lookup failed");
                None
            }
        };
        if self.nicknames.len() >= NICKNAME_SWEEP_AT {
            self.nicknames.retain(|_, cached| cached.is_fresh(now));
        }
        self.nicknames.insert(
            key,
            CachedNick {
                nick: nick.clone(),
                fetched: now,
            },
        );
        nick
    }

    /// Guild nickname, then global display name, then username, per author.
    async fn display_names(&self, guild_id: u64, messages: &[Message]) -> HashMap<u64, String> {
        let mut names = HashMap::new();
        for msg in messages {
            let author = msg.author.id.get();
            if names.contains_key(&author) {
                continue;
            }
            let nick = match (&msg.member, msg.author.bot) {
                (Some(member), _) => member.nick.clone(),
                (None, true) => None,
                (None, false) => self.nickname(guild_id, msg.author.id).await,
            };
            let name = nick
                .or_else(|| msg.author.global_name.clone())
                .unwrap_or_else(|| msg.author.name.clone());
            names.insert(author, name);
        }
        names
    }

    async fn source(&self, channel_id: u64) -> Result<SourceInfo, PlatformError> {
        match ChannelId::new(channel_id)
            .to_channel(&self.http)
            .await
            .map_err(map_err)?
        {
            Channel::Guild(gc) => Ok(source_info(&gc)),
            _ => Err(PlatformError::NotFound(format!(
                "channel {channel_id} is not a guild channel"
            ))),
        }
    }

    /// Oldest `limit` messages created after snowflake `after`.
    async fn fetch_after(
        &self,
        channel: ChannelId,
        mut after: u64,
        limit: usize,
    ) -> Result<Vec<Message>, PlatformError> {
        let mut out: Vec<Message> = Vec::new();
        while out.len() < limit {
            let page = PAGE_SIZE.min(limit - out.len());
            let batch = channel
                .messages(
                    &self.http,
                    GetMessages::new()
                        .after(MessageId::new(after))
                        .limit(page as u8),
                )
                .await
                .map_err(map_err)?;
            let fetched = batch.len();
            match batch.iter().map(|m| m.id.get()).max() {
                Some(newest) => after = newest,
                None => break,
            }
            out.extend(batch);
            if fetched < page {
                break;
            }
        }
        out.sort_by_key(|m| m.id);
        out.truncate(limit);
        Ok(out)
    }

    /// Newest `limit` messages, returned oldest first.
    async fn fetch_latest(
        &self,
        channel: ChannelId,
        limit: usize,
    ) -> Result<Vec<Message>, PlatformError> {
        let mut out: Vec<Message> = Vec::new();
        let mut before: Option<MessageId> = None;
        while out.len() < limit {
            let page = PAGE_SIZE.min(limit - out.len());
            let mut request = GetMessages::new().limit(page as u8);
            if let Some(id) = before {
                request = request.before(id);
            }
            let batch = channel
                .messages(&self.http, request)
                .await
                .map_err(map_err)?;
            let fetched = batch.len();
            match batch.iter().map(|m| m.id).min() {
                Some(oldest) => before = Some(oldest),
                None => break,
            }
            out.extend(batch);
            if fetched < page {
                break;
            }
        }
        out.sort_by_key(|m| m.id);
        Ok(out)
    }
}

#[async_trait]
impl ChatPlatform for SerenityPlatform {
    async fn resolve_guild(&self, guild_id: u64) -> Result<Option<GuildInfo>, PlatformError> {
        if guild_id == 0 {
            return Ok(None);
        }
        match GuildId::new(guild_id).to_partial_guild(&self.http).await {
            Ok(guild) => Ok(Some(GuildInfo {
                id: guild_id,
                name: guild.name,
            })),
            Err(e) => match map_err(e) {
                PlatformError::NotFound(_) => Ok(None),
                other => Err(other),
            },
        }
    }

    async fn resolve_channel(
        &self,
        guild_id: u64,
        channel_id: u64,
    ) -> Result<Option<SourceInfo>, PlatformError> {
        if channel_id == 0 {
            return Ok(None);
        }
        match self.source(channel_id).await {
            Ok(source) if source.guild_id == guild_id => Ok(Some(source)),
            Ok(_) | Err(PlatformError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn active_threads(&self, source: &SourceInfo) -> Result<Vec<ThreadInfo>, PlatformError> {
        let data = GuildId::new(source.guild_id)
            .get_active_threads(&self.http)
            .await
            .map_err(map_err)?;
        Ok(data
            .threads
            .iter()
            .filter(|t| t.parent_id.map(|p| p.get()) == Some(source.id))
            .map(thread_info)
            .collect())
    }

    async fn archived_threads(
        &self,
        source: &SourceInfo,
        visibility: ArchiveVisibility,
    ) -> Result<Vec<ThreadInfo>, PlatformError> {
        let channel = ChannelId::new(source.id);
        let mut threads = Vec::new();
        let mut seen = HashSet::new();
        let mut before: Option<u64> = None;

        // Listings come newest-archived first; walk back until exhausted.
        loop {
            let page = match visibility {
                ArchiveVisibility::Public => {
                    channel
                        .get_archived_public_threads(&self.http, before, Some(ARCHIVE_PAGE))
                        .await
                }
                ArchiveVisibility::Private => {
                    channel
                        .get_archived_private_threads(&self.http, before, Some(ARCHIVE_PAGE))
                        .await
                }
            };
            let data = match page {
                Ok(data) => data,
                Err(e) if before.is_none() => return Err(map_err(e)),
                Err(e) => {
                    warn!(channel_id = source.id, error = %e, "archived thread page failed, keeping earlier pages");
                    break;
                }
            };

            let fresh: Vec<&GuildChannel> = data
                .threads
                .iter()
                .filter(|t| seen.insert(t.id.get()))
                .collect();
            threads.extend(fresh.iter().map(|t| thread_info(t)));
            if !data.has_more || fresh.is_empty() {
                break;
            }

            let cursor = archive_cursor(data.threads.iter().map(|t| {
                t.thread_metadata
                    .and_then(|m| m.archive_timestamp)
                    .map(|ts| ts.unix_timestamp())
            }));
            match cursor {
                Some(next) if Some(next) != before => before = Some(next),
                _ => break,
            }
        }
        debug!(channel_id = source.id, count = threads.len(), ?visibility, "archived threads listed");
        Ok(threads)
    }

    async fn history(
        &self,
        source_id: u64,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, PlatformError> {
        let source = self.source(source_id).await?;
        let channel = ChannelId::new(source_id);
        let raw = match since {
            Some(since) => {
                self.fetch_after(channel, snowflake_before(since), limit)
                    .await?
            }
            None => self.fetch_latest(channel, limit).await?,
        };
        debug!(channel_id = source_id, count = raw.len(), "history fetched");
        let names = self.display_names(source.guild_id, &raw).await;
        Ok(raw
            .iter()
            .map(|m| {
                let name = names.get(&m.author.id.get()).cloned().unwrap_or_default();
                to_chat_message(m, &source, name)
            })
            .collect())
    }

    async fn post_message(&self, channel_id: u64, text: &str) -> Result<(), PlatformError> {
        ChannelId::new(channel_id)
            .say(&self.http, text)
            .await
            .map(|_| ())
            .map_err(map_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cached_nicknames_expire() {
        let fetched = Instant::now();
        let cached = CachedNick {
            nick: Some("Ana".to_string()),
            fetched,
        };
        assert!(cached.is_fresh(fetched));
        assert!(cached.is_fresh(fetched + NICKNAME_TTL - Duration::from_secs(1)));
        assert!(!cached.is_fresh(fetched + NICKNAME_TTL));
    }

    #[test]
    fn archive_cursor_is_oldest_archive_time() {
        assert_eq!(
            archive_cursor([Some(1_700_000_300), None, Some(1_700_000_100)]),
            Some(1_700_000_100)
        );
        assert_eq!(archive_cursor([None, None]), None);
        assert_eq!(archive_cursor(Vec::new()), None);
    }

    #[test]
    fn snowflake_time_decodes_known_id() {
        let at = snowflake_time(175_928_847_299_117_063);
        assert_eq!(at.to_rfc3339(), "2016-04-30T11:18:25.796+00:00");
    }

    #[test]
    fn snowflake_before_is_just_under_the_instant() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let id = snowflake_before(at);
        assert!(snowflake_time(id) < at);
        assert_eq!(snowflake_time(id + 1), at);
    }

    #[test]
    fn snowflake_before_epoch_clamps() {
        let at = Utc.with_ymd_and_hms(2010, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(snowflake_before(at), 1);
    }

    #[test]
    fn channel_types_map_to_source_kinds() {
        assert_eq!(source_kind(ChannelType::Text), SourceKind::Text);
        assert_eq!(source_kind(ChannelType::News), SourceKind::Text);
        assert_eq!(source_kind(ChannelType::PrivateThread), SourceKind::Thread);
        assert_eq!(source_kind(ChannelType::Category), SourceKind::Category);
        assert_eq!(source_kind(ChannelType::Voice), SourceKind::Other);
    }
}
