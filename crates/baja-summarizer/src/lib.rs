//! `baja-summarizer`: turns chat history into LLM-written summaries.
//!
//! [`transcript`] flattens messages into interleaved text/image content
//! blocks, [`provider`] is the LLM seam (OpenAI-compatible over HTTP, with
//! model failover in [`router`]), and [`summarizer::Summarizer`] ties them
//! together behind the [`SummaryPipeline`] trait the scheduler consumes.

pub mod openai;
pub mod prompt;
pub mod provider;
pub mod router;
pub mod summarizer;
pub mod transcript;

pub use provider::{ChatRequest, ChatResponse, ContentBlock, LlmProvider, ProviderError};
pub use summarizer::{Summarizer, SummaryError, SummaryPipeline};
pub use transcript::Section;
