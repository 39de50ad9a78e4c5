use pv_core::ValidationError;

pub const MAX_MESSAGE_LENGTH: usize = 4000;

/// Checks inbound text before any state is touched.
#[derive(Debug, Clone, Copy)]
pub struct MessageValidator {
    pub max_length: usize,
}

impl MessageValidator {
    pub fn new(max_length: usize) -> Self {
        Self { max_length }
    }

    /// `None` stands for an update that carried no text (sticker, photo, ...).
    /// Length counts characters, not bytes.
    pub fn validate(&self, text: Option<&str>) -> Result<(), ValidationError> {
        let Some(text) = text else {
            return Err(ValidationError::Missing);
        };
        if text.trim().is_empty() {
            tracing::warn!("received empty message (only whitespace)");
            return Err(ValidationError::Empty);
        }
        let length = text.chars().count();
        if length > self.max_length {
            tracing::warn!(length, max = self.max_length, "received too long message");
            return Err(ValidationError::TooLong { length, max: self.max_length });
        }
        Ok(())
    }
}

impl Default for MessageValidator {
    fn default() -> Self {
        Self::new(MAX_MESSAGE_LENGTH)
    }
}
