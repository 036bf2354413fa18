use async_trait::async_trait;
use baja_core::ChatMessage;
use thiserror::Error;
use tracing::{debug, info};

use crate::prompt;
use crate::provider::{ChatRequest, ContentBlock, LlmProvider, ProviderError};
use crate::transcript::{build_sectioned_transcript, build_transcript, Section};

/// Thread titles longer than this are cut to fit, ending in `...`.
pub const MAX_TITLE_LEN: usize = 100;

/// Prefix on flat summaries.
pub const FLAT_SUMMARY_HEADING: &str = "**Thread Summary:**";

#[derive(Debug, Error)]
pub enum SummaryError {
    /// Nothing summarizable after bots and empty messages were dropped.
    #[error("not enough content to summarize")]
    EmptyTranscript,

    #[error("model returned an empty summary")]
    EmptyResponse,

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// What the scheduler and the slash commands need from the summarizer.
#[async_trait]
pub trait SummaryPipeline: Send + Sync {
    /// Bulleted summary of one conversation, prefixed with
    /// [`FLAT_SUMMARY_HEADING`].
    async fn summarize_flat(&self, messages: &[ChatMessage]) -> Result<String, SummaryError>;

    /// One `##` block per section.
    async fn summarize_sectioned(&self, sections: &[Section]) -> Result<String, SummaryError>;

    /// Short title for a thread, `None` when the model produced nothing.
    async fn title(&self, messages: &[ChatMessage]) -> Result<Option<String>, SummaryError>;
}

pub struct Summarizer {
    provider: Box<dyn LlmProvider>,
    max_tokens: u32,
}

impl Summarizer {
    pub fn new(provider: Box<dyn LlmProvider>, max_tokens: u32) -> Self {
        Self {
            provider,
            max_tokens,
        }
    }

    async fn complete(
        &self,
        system: &str,
        content: Vec<ContentBlock>,
    ) -> Result<String, SummaryError> {
        let req = ChatRequest {
            system: system.to_string(),
            content,
            max_tokens: self.max_tokens,
        };
        let resp = self.provider.send(&req).await?;
        info!(
            model = %resp.model,
            tokens_in = resp.tokens_in,
            tokens_out = resp.tokens_out,
            "summary generated"
        );
        Ok(resp.content.trim().to_string())
    }
}

#[async_trait]
impl SummaryPipeline for Summarizer {
    async fn summarize_flat(&self, messages: &[ChatMessage]) -> Result<String, SummaryError> {
        let content = build_transcript(messages);
        if content.is_empty() {
            return Err(SummaryError::EmptyTranscript);
        }
        debug!(messages = messages.len(), blocks = content.len(), "flat summary");

        let summary = self.complete(prompt::FLAT_SUMMARY, content).await?;
        if summary.is_empty() {
            return Err(SummaryError::EmptyResponse);
        }
        Ok(format!("{FLAT_SUMMARY_HEADING}\n{summary}"))
    }

    async fn summarize_sectioned(&self, sections: &[Section]) -> Result<String, SummaryError> {
        if sections.is_empty() {
            return Err(SummaryError::EmptyTranscript);
        }
        let content = build_sectioned_transcript(sections);
        debug!(sections = sections.len(), blocks = content.len(), "sectioned summary");

        let summary = self.complete(prompt::SECTIONED_SUMMARY, content).await?;
        if summary.is_empty() {
            return Err(SummaryError::EmptyResponse);
        }
        Ok(summary)
    }

    async fn title(&self, messages: &[ChatMessage]) -> Result<Option<String>, SummaryError> {
        let content = build_transcript(messages);
        if content.is_empty() {
            return Ok(None);
        }
        let title = self.complete(prompt::THREAD_TITLE, content).await?;
        Ok(clean_title(&title))
    }
}

/// Strip quoting the model likes to add and cap the length.
fn clean_title(raw: &str) -> Option<String> {
    let title = raw.trim().trim_matches(|c| c == '"' || c == '*').trim();
    if title.is_empty() {
        return None;
    }
    if title.chars().count() > MAX_TITLE_LEN {
        let cut: String = title.chars().take(MAX_TITLE_LEN - 3).collect();
        return Some(format!("{cut}..."));
    }
    Some(title.to_string())
}
