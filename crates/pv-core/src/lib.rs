pub mod config;
pub mod error;
pub mod types;

pub use config::{PalaverConfig, SessionSettings};
pub use error::{PvError, Result, ValidationError};
pub use types::{Role, SystemPromptMode, Turn};
