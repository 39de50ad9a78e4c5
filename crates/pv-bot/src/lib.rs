//! Telegram front end for the Palaver assistant.

pub mod bot;
pub mod logging;
pub mod maintenance;
pub mod openrouter;
pub mod rate_limit;
pub mod role;
pub mod telegram;

pub use bot::{Bot, Command};
pub use maintenance::Maintenance;
pub use openrouter::OpenRouterClient;
pub use rate_limit::RateLimiter;
pub use role::RoleManager;
pub use telegram::TelegramClient;
