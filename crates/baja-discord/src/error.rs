use baja_core::PlatformError;
use baja_parts::PartsError;
use baja_scheduler::SchedulerError;
use baja_summarizer::SummaryError;

/// Errors produced by the Discord adapter and its commands.
#[derive(Debug, thiserror::Error)]
pub enum DiscordError {
    #[error("serenity error: {0}")]
    Serenity(#[from] serenity::Error),

    /// Bad command input; the text is shown to the user as-is.
    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Summary(#[from] SummaryError),

    #[error(transparent)]
    Parts(#[from] PartsError),

    #[error(transparent)]
    Platform(#[from] PlatformError),
}

impl DiscordError {
    /// Text for the invoking user.
    ///
    /// Input problems are echoed back so the user can fix them; everything
    /// else is reported as an error.
    pub fn user_message(&self) -> String {
        match self {
            DiscordError::Usage(msg) => msg.clone(),
            DiscordError::Scheduler(
                e @ (SchedulerError::InvalidTime(_)
                | SchedulerError::InvalidTimezone(_)
                | SchedulerError::InvalidDuration(_)
                | SchedulerError::Validation(_)
                | SchedulerError::NotFound { .. }),
            ) => format!("\u{26a0}\u{fe0f} {e}"),
            DiscordError::Parts(e @ PartsError::UnknownOption { .. }) => {
                format!("\u{26a0}\u{fe0f} {e}")
            }
            other => format!("An error occurred: {other}"),
        }
    }
}

pub type Result<T> = std::result::Result<T, DiscordError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_errors_are_shown_verbatim() {
        let err = DiscordError::Usage("Pick a text channel.".to_string());
        assert_eq!(err.user_message(), "Pick a text channel.");
    }

    #[test]
    fn validation_errors_get_a_warning_prefix() {
        let err = DiscordError::from(SchedulerError::InvalidTime("25:00".to_string()));
        assert_eq!(
            err.user_message(),
            "\u{26a0}\u{fe0f} Invalid time '25:00', expected HH:MM (24-hour)"
        );
    }

    #[test]
    fn other_errors_are_reported_generically() {
        let err = DiscordError::from(SummaryError::EmptyResponse);
        assert_eq!(
            err.user_message(),
            "An error occurred: model returned an empty summary"
        );
    }
}
