use thiserror::Error;

#[derive(Debug, Error)]
pub enum PartsError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Notion API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    /// The data source or page lacks a property the bot relies on.
    #[error("Property '{0}' not found")]
    MissingProperty(String),

    #[error("'{option}' is not a valid {property} option")]
    UnknownOption { property: String, option: String },
}

pub type Result<T> = std::result::Result<T, PartsError>;
