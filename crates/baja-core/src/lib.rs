//! `baja-core`: configuration, errors, and the chat-platform seam shared by
//! every other crate in the workspace.

pub mod config;
pub mod duration;
pub mod error;
pub mod platform;
pub mod types;

pub use duration::{parse_duration, window_start, InvalidDuration};
pub use error::{BajaError, Result};
pub use platform::{ChatPlatform, PlatformError};
pub use types::{ChatAttachment, ChatMessage};
