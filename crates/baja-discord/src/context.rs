use std::sync::Arc;

use baja_core::config::DiscordConfig;
use baja_parts::NotionClient;
use baja_scheduler::{ScheduleManager, ScheduleStore};
use baja_summarizer::SummaryPipeline;

use crate::platform::SerenityPlatform;

/// Everything the event handler and slash commands share.
pub struct BotContext {
    pub config: DiscordConfig,
    pub platform: Arc<SerenityPlatform>,
    pub manager: Arc<ScheduleManager>,
    pub summarizer: Arc<dyn SummaryPipeline>,
    /// `None` when no Notion data source is configured.
    pub parts: Option<Arc<NotionClient>>,
    /// Message cap for interactive summaries.
    pub history_limit: usize,
}

impl BotContext {
    pub fn store(&self) -> &Arc<ScheduleStore> {
        &self.manager.context().store
    }
}
