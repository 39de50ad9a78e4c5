use crate::database::{to_db_time, Database};
use async_trait::async_trait;
use chrono::Utc;
use pv_core::Turn;
use pv_session::{Identity, Transcript};
use rusqlite::params;

/// Writes each completed exchange to SQLite in one transaction.
#[derive(Debug, Clone)]
pub struct SqliteTranscript {
    db: Database,
}

impl SqliteTranscript {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Transcript for SqliteTranscript {
    async fn record(&self, identity: &Identity, exchange: &[Turn]) -> anyhow::Result<()> {
        let user_id = identity.user_id;
        let handle = identity.handle.clone();
        let display_name = identity.display_name.clone();
        let turns = exchange.to_vec();
        let stamp = to_db_time(Utc::now());

        let written = self
            .db
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO users (id, username, first_name, created_at, last_accessed) \
                     VALUES (?1, ?2, ?3, ?4, ?4)",
                    params![user_id, handle, display_name, stamp],
                )?;
                tx.execute(
                    "UPDATE users SET last_accessed = ?2 WHERE id = ?1",
                    params![user_id, stamp],
                )?;
                for turn in &turns {
                    tx.execute(
                        "INSERT INTO messages (user_id, role, content, length, created_at) \
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![
                            user_id,
                            turn.role.as_str(),
                            turn.content,
                            turn.content.chars().count() as i64,
                            stamp
                        ],
                    )?;
                }
                tx.commit()?;
                Ok(turns.len())
            })
            .await?;

        tracing::debug!(user_id, written, "exchange recorded");
        Ok(())
    }
}
