//! Chat-platform seam consumed by the scheduler and implemented by the
//! Discord adapter. Kept here so neither side depends on the other.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::{ChatMessage, GuildInfo, SourceInfo, ThreadInfo};

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("request failed: {0}")]
    Request(String),
}

/// Which archived-thread listing to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveVisibility {
    Public,
    Private,
}

impl std::fmt::Display for ArchiveVisibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::Private => write!(f, "private"),
        }
    }
}

#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// `Ok(None)` when the guild is unknown to the bot (left, deleted).
    async fn resolve_guild(&self, guild_id: u64) -> Result<Option<GuildInfo>, PlatformError>;

    /// `Ok(None)` when the channel does not exist in that guild.
    async fn resolve_channel(
        &self,
        guild_id: u64,
        channel_id: u64,
    ) -> Result<Option<SourceInfo>, PlatformError>;

    /// Currently open sub-threads of `source`.
    async fn active_threads(&self, source: &SourceInfo) -> Result<Vec<ThreadInfo>, PlatformError>;

    /// Archived sub-threads of `source` with the given visibility.
    async fn archived_threads(
        &self,
        source: &SourceInfo,
        visibility: ArchiveVisibility,
    ) -> Result<Vec<ThreadInfo>, PlatformError>;

    /// Messages in `source_id` created at or after `since`, oldest first,
    /// capped at `limit`.
    async fn history(
        &self,
        source_id: u64,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, PlatformError>;

    /// Post `text` to `channel_id`. Callers keep each text within
    /// [`MAX_MESSAGE_LEN`](crate::types::MAX_MESSAGE_LEN).
    async fn post_message(&self, channel_id: u64, text: &str) -> Result<(), PlatformError>;

    /// Inline reference to a channel inside message text.
    fn channel_mention(&self, channel_id: u64) -> String {
        format!("<#{channel_id}>")
    }
}
