//! In-memory stand-ins for the chat platform and summary pipeline.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use baja_core::platform::ArchiveVisibility;
use baja_core::types::{ChatMessage, GuildInfo, SourceInfo, SourceKind, ThreadInfo};
use baja_core::{ChatPlatform, PlatformError};
use baja_summarizer::{Section, SummaryError, SummaryPipeline};
use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::runtime::Clock;

/// Wall clock pinned to `base` at construction that advances with Tokio's
/// (pausable) clock.
pub struct TestClock {
    base: DateTime<Utc>,
    start: Instant,
}

impl TestClock {
    pub fn at(base: DateTime<Utc>) -> Self {
        Self {
            base,
            start: Instant::now(),
        }
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = Instant::now() - self.start;
        self.base + chrono::Duration::from_std(elapsed).unwrap()
    }
}

pub fn message(id: u64, source_id: u64, created_at: DateTime<Utc>) -> ChatMessage {
    ChatMessage {
        id,
        source_id,
        source_name: format!("source-{source_id}"),
        in_thread: false,
        author_name: "ana".to_string(),
        author_is_bot: false,
        content: format!("message {id}"),
        attachments: Vec::new(),
        created_at,
    }
}

pub fn thread(id: u64, parent_id: u64) -> ThreadInfo {
    ThreadInfo {
        id,
        name: format!("thread-{id}"),
        parent_id,
    }
}

#[derive(Default)]
pub struct FakePlatform {
    guild_id: u64,
    channels: HashMap<u64, SourceInfo>,
    messages: HashMap<u64, Vec<ChatMessage>>,
    active: HashMap<u64, Vec<ThreadInfo>>,
    archived: HashMap<(u64, bool), Vec<ThreadInfo>>,
    deny_private: bool,
    broken: HashSet<u64>,
    history_calls: Mutex<HashMap<u64, usize>>,
    pub posted: Mutex<Vec<(u64, String)>>,
}

impl FakePlatform {
    pub fn new(guild_id: u64) -> Self {
        Self {
            guild_id,
            ..Default::default()
        }
    }

    pub fn with_channel(mut self, id: u64, name: &str) -> Self {
        self.channels.insert(
            id,
            SourceInfo {
                id,
                guild_id: self.guild_id,
                name: name.to_string(),
                kind: SourceKind::Text,
                parent_id: None,
            },
        );
        self
    }

    pub fn with_messages(mut self, source_id: u64, msgs: Vec<ChatMessage>) -> Self {
        self.messages.entry(source_id).or_default().extend(msgs);
        self
    }

    pub fn with_active_threads(mut self, source_id: u64, threads: Vec<ThreadInfo>) -> Self {
        self.active.insert(source_id, threads);
        self
    }

    pub fn with_archived_threads(
        mut self,
        source_id: u64,
        visibility: ArchiveVisibility,
        threads: Vec<ThreadInfo>,
    ) -> Self {
        let private = visibility == ArchiveVisibility::Private;
        self.archived.insert((source_id, private), threads);
        self
    }

    pub fn deny_private_archives(mut self) -> Self {
        self.deny_private = true;
        self
    }

    pub fn with_broken_history(mut self, source_id: u64) -> Self {
        self.broken.insert(source_id);
        self
    }

    pub fn source(&self, id: u64) -> SourceInfo {
        self.channels[&id].clone()
    }

    pub fn history_calls(&self, source_id: u64) -> usize {
        self.history_calls
            .lock()
            .unwrap()
            .get(&source_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn posted(&self) -> Vec<(u64, String)> {
        self.posted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatPlatform for FakePlatform {
    async fn resolve_guild(&self, guild_id: u64) -> Result<Option<GuildInfo>, PlatformError> {
        Ok((guild_id == self.guild_id).then(|| GuildInfo {
            id: guild_id,
            name: "baja".to_string(),
        }))
    }

    async fn resolve_channel(
        &self,
        guild_id: u64,
        channel_id: u64,
    ) -> Result<Option<SourceInfo>, PlatformError> {
        if guild_id != self.guild_id {
            return Ok(None);
        }
        Ok(self.channels.get(&channel_id).cloned())
    }

    async fn active_threads(&self, source: &SourceInfo) -> Result<Vec<ThreadInfo>, PlatformError> {
        Ok(self.active.get(&source.id).cloned().unwrap_or_default())
    }

    async fn archived_threads(
        &self,
        source: &SourceInfo,
        visibility: ArchiveVisibility,
    ) -> Result<Vec<ThreadInfo>, PlatformError> {
        let private = visibility == ArchiveVisibility::Private;
        if private && self.deny_private {
            return Err(PlatformError::PermissionDenied(
                "missing Manage Threads".to_string(),
            ));
        }
        Ok(self
            .archived
            .get(&(source.id, private))
            .cloned()
            .unwrap_or_default())
    }

    async fn history(
        &self,
        source_id: u64,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, PlatformError> {
        *self.history_calls.lock().unwrap().entry(source_id).or_default() += 1;
        if self.broken.contains(&source_id) {
            return Err(PlatformError::Request("boom".to_string()));
        }
        let mut msgs: Vec<ChatMessage> = self
            .messages
            .get(&source_id)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|m| since.map_or(true, |s| m.created_at >= s))
            .collect();
        msgs.sort_by_key(|m| m.created_at);
        msgs.truncate(limit);
        Ok(msgs)
    }

    async fn post_message(&self, channel_id: u64, text: &str) -> Result<(), PlatformError> {
        self.posted
            .lock()
            .unwrap()
            .push((channel_id, text.to_string()));
        Ok(())
    }
}

/// Counts calls and echoes a fixed summary.
#[derive(Default)]
pub struct FakePipeline {
    pub flat_calls: AtomicUsize,
    pub sectioned_calls: AtomicUsize,
    pub last_sections: Mutex<Vec<String>>,
    pub fail: bool,
}

impl FakePipeline {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.flat_calls.load(Ordering::SeqCst) + self.sectioned_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SummaryPipeline for FakePipeline {
    async fn summarize_flat(&self, messages: &[ChatMessage]) -> Result<String, SummaryError> {
        self.flat_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(SummaryError::EmptyResponse);
        }
        Ok(format!("**Thread Summary:**\n- {} messages", messages.len()))
    }

    async fn summarize_sectioned(&self, sections: &[Section]) -> Result<String, SummaryError> {
        self.sectioned_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_sections.lock().unwrap() = sections.iter().map(|s| s.name.clone()).collect();
        if self.fail {
            return Err(SummaryError::EmptyResponse);
        }
        Ok(sections
            .iter()
            .map(|s| format!("## {}\n- {} messages", s.name, s.messages.len()))
            .collect::<Vec<_>>()
            .join("\n\n"))
    }

    async fn title(&self, _messages: &[ChatMessage]) -> Result<Option<String>, SummaryError> {
        Ok(None)
    }
}
