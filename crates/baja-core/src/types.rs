use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Hard per-message character limit imposed by the chat platform.
pub const MAX_MESSAGE_LEN: usize = 2000;

/// A single historical chat message. Read-only to everything in this workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: u64,
    /// Channel or thread the message was posted in.
    pub source_id: u64,
    pub source_name: String,
    /// True when `source_id` is a sub-thread rather than the top-level channel.
    pub in_thread: bool,
    /// Display name (guild nickname when set).
    pub author_name: String,
    pub author_is_bot: bool,
    pub content: String,
    pub attachments: Vec<ChatAttachment>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatAttachment {
    pub url: String,
    pub content_type: Option<String>,
}

impl ChatAttachment {
    pub fn is_image(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("image/"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Text,
    Thread,
    Category,
    Other,
}

/// A channel-like container of messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub id: u64,
    pub guild_id: u64,
    pub name: String,
    pub kind: SourceKind,
    /// Category for a channel, parent channel for a thread.
    pub parent_id: Option<u64>,
}

/// A sub-thread discovered under a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadInfo {
    pub id: u64,
    pub name: String,
    pub parent_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildInfo {
    pub id: u64,
    pub name: String,
}
