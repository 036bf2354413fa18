//! `baja-discord`: the bot's Discord surface.
//!
//! [`SerenityPlatform`] implements the chat-platform seam over the REST API
//! for the scheduler and the summary commands. [`DiscordAdapter`] runs the
//! gateway: slash commands, part components, thread titling and adding
//! subscribers to new threads.

pub mod adapter;
pub mod commands;
pub mod context;
pub mod embed;
pub mod error;
pub mod handler;
pub mod platform;
pub mod send;

pub use adapter::DiscordAdapter;
pub use context::BotContext;
pub use error::DiscordError;
pub use platform::SerenityPlatform;
