//! `baja-parts`: parts records kept in a Notion data source.
//!
//! [`NotionClient`] searches parts by number or name, reads the status
//! options of the data source, and writes status and quantity updates back.
//! [`Part`] gives typed access to the handful of properties the bot shows.

pub mod client;
pub mod error;
pub mod types;

pub use client::NotionClient;
pub use error::{PartsError, Result};
pub use types::{DrawingFile, Part, PartSearch, PartsSchema, StatusField};
