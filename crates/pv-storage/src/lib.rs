//! Durable SQLite record of users and messages, used by the dashboard.
//!
//! This is an audit log. The in-memory session store never reloads from it.

pub mod database;
pub mod error;
pub mod messages;
pub mod schema;
pub mod stats;
pub mod transcript;
pub mod users;

pub use database::Database;
pub use error::{Result, StorageError};
pub use messages::{MessageRecord, MessageRepository};
pub use stats::{KpiMetric, Period, StatsCollector, StatsResponse, TimelinePoint, Trend};
pub use transcript::SqliteTranscript;
pub use users::{UserRecord, UserRepository};
