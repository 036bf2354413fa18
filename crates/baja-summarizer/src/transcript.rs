//! Flattens chat history into the multi-part user content an LLM reads.
//!
//! Text accumulates into one block until a message carries images; the
//! pending text is then flushed and each image follows as its own block, so
//! the model sees pictures next to the lines that posted them.

use std::collections::HashSet;

use baja_core::ChatMessage;

use crate::provider::ContentBlock;

/// One source's messages inside a multi-channel transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub name: String,
    pub messages: Vec<ChatMessage>,
}

impl Section {
    pub fn new(name: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            name: name.into(),
            messages,
        }
    }
}

/// Incremental transcript writer shared by the flat and sectioned layouts.
#[derive(Default)]
pub struct TranscriptBuilder {
    blocks: Vec<ContentBlock>,
    pending: String,
    seen_images: HashSet<String>,
    last_thread: Option<u64>,
}

impl TranscriptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw text to the pending block.
    pub fn push_text(&mut self, text: &str) {
        self.pending.push_str(text);
    }

    /// Forget thread and image state, as at the start of a new section.
    pub fn reset_context(&mut self) {
        self.seen_images.clear();
        self.last_thread = None;
    }

    pub fn push_message(&mut self, msg: &ChatMessage) {
        if msg.author_is_bot {
            return;
        }

        if msg.in_thread {
            if self.last_thread != Some(msg.source_id) {
                self.pending
                    .push_str(&format!("\n[Thread: {}]\n", msg.source_name));
                self.last_thread = Some(msg.source_id);
            }
        } else {
            self.last_thread = None;
        }

        let header = format!(
            "[{}] {}: ",
            msg.created_at.format("%H:%M"),
            msg.author_name
        );

        if !msg.content.is_empty() {
            self.pending.push_str(&header);
            self.pending.push_str(&msg.content);
            self.pending.push('\n');
        }

        let images: Vec<&str> = msg
            .attachments
            .iter()
            .filter(|a| a.is_image())
            .filter_map(|a| {
                if self.seen_images.insert(a.url.clone()) {
                    Some(a.url.as_str())
                } else {
                    None
                }
            })
            .collect();

        if images.is_empty() {
            return;
        }

        if msg.content.is_empty() {
            self.pending.push_str(&header);
        }
        self.pending
            .push_str(&format!("[Attached {} image(s)]\n", images.len()));
        self.flush();
        self.blocks
            .extend(images.into_iter().map(ContentBlock::image));
    }

    fn flush(&mut self) {
        if !self.pending.is_empty() {
            let text = std::mem::take(&mut self.pending);
            self.blocks.push(ContentBlock::text(text));
        }
    }

    pub fn finish(mut self) -> Vec<ContentBlock> {
        self.flush();
        self.blocks
    }
}

/// Chronological transcript of a single conversation.
pub fn build_transcript(messages: &[ChatMessage]) -> Vec<ContentBlock> {
    let mut builder = TranscriptBuilder::new();
    for msg in messages {
        builder.push_message(msg);
    }
    builder.finish()
}

/// Transcript grouped under `=== CHANNEL: #name ===` banners, in section order.
pub fn build_sectioned_transcript(sections: &[Section]) -> Vec<ContentBlock> {
    let mut builder = TranscriptBuilder::new();
    builder.push_text("MULTI-CHANNEL CONVERSATION:\n\n");
    for section in sections {
        builder.reset_context();
        builder.push_text(&format!("=== CHANNEL: #{} ===\n", section.name));
        for msg in &section.messages {
            builder.push_message(msg);
        }
        builder.push_text("\n");
    }
    builder.finish()
}
