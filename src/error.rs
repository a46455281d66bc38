use thiserror::Error;

#[cfg(feature = "ssr")]
use crate::model::{DrawOutcome, DrawRecord};

/// Reasons a draw can fail. Everything except `Database` is a rule rejection that the player sees
/// as a message.
#[cfg(feature = "ssr")]
#[derive(Debug, Error)]
pub enum DrawError {
    #[error("Please enter your name (up to {max} characters)")]
    InvalidName { max: usize },

    #[error("Missing session, reload the page and try again")]
    InvalidSession,

    #[error("Game not found")]
    GameNotFound,

    #[error("The draw is not open")]
    GameNotActive,

    #[error("You have already drawn slot {}", .0.slot_number)]
    AlreadyDrawn(DrawRecord),

    #[error("Slot {0} does not exist")]
    InvalidSlot(i32),

    #[error("Slot {0} has already been taken")]
    SlotTaken(i32),

    #[error(transparent)]
    Database(#[from] diesel::result::Error),
}

#[cfg(feature = "ssr")]
impl DrawError {
    /// Stable code carried in `DrawOutcome::error`.
    pub fn code(&self) -> &'static str {
        match self {
            DrawError::InvalidName { .. } => "invalid_name",
            DrawError::InvalidSession => "invalid_session",
            DrawError::GameNotFound => "game_not_found",
            DrawError::GameNotActive => "game_not_active",
            DrawError::AlreadyDrawn(_) => "already_drawn",
            DrawError::InvalidSlot(_) => "invalid_slot",
            DrawError::SlotTaken(_) => "slot_taken",
            DrawError::Database(_) => "database_error",
        }
    }

    /// Converts a rule rejection into a failed outcome. Database errors are handed back so the
    /// caller can propagate them.
    pub fn into_outcome(self) -> Result<DrawOutcome, diesel::result::Error> {
        let code = self.code();
        match self {
            DrawError::Database(e) => Err(e),
            DrawError::AlreadyDrawn(record) => {
                let message = format!("You have already drawn slot {}", record.slot_number);
                Ok(DrawOutcome {
                    success: false,
                    error: Some(code.to_string()),
                    message: Some(message),
                    ..DrawOutcome::won(&record)
                })
            }
            other => Ok(DrawOutcome::rejected(code, other.to_string())),
        }
    }
}

/// Rejected form input from the public or admin forms.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    Required(&'static str),

    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange {
        field: &'static str,
        min: i64,
        max: i64,
    },

    #[error("Line {line}: {reason}")]
    BadLine { line: usize, reason: String },
}

/// Startup configuration problems.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set in .env")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}
