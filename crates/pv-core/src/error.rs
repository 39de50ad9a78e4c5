use std::time::Duration;
use thiserror::Error;

/// Generic reply for any failure whose cause must stay out of the chat.
pub const GENERIC_FAILURE_MESSAGE: &str =
    "😔 Sorry, something went wrong while processing your request. Please try again.";

/// Rejections of inbound user text. Each carries its own user-facing wording.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("❌ Please send a text message.")]
    Missing,
    #[error("❌ The message cannot be empty. Please enter some text.")]
    Empty,
    #[error(
        "❌ Your message is too long ({length} characters). Maximum length: {max} characters. \
         Please split it into several messages."
    )]
    TooLong { length: usize, max: usize },
}

#[derive(Error, Debug)]
pub enum PvError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Language model error: {0}")]
    Upstream(String),
    #[error("Language model call timed out after {0:?}")]
    Timeout(Duration),
    #[error("Storage invariant violated: {0}")]
    Invariant(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PvError {
    /// Text that may be shown to an end user. Only validation failures are specific.
    pub fn user_message(&self) -> String {
        match self {
            PvError::Validation(v) => v.to_string(),
            _ => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }

    /// Whether the failure came from the language model side (network, API, timeout).
    pub fn is_upstream(&self) -> bool {
        matches!(self, PvError::Upstream(_) | PvError::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, PvError>;
