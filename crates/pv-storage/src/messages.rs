use crate::database::{from_db_time, opt_from_db_time, to_db_time, Database};
use crate::error::Result;
use chrono::{DateTime, Utc};
use pv_core::Role;
use rusqlite::types::Type;
use rusqlite::{params, Row};
use serde::Serialize;

/// A row of `messages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageRecord {
    pub id: i64,
    pub user_id: i64,
    pub role: Role,
    pub content: String,
    /// Content length in chars.
    pub length: i64,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

const COLUMNS: &str = "m.id, m.user_id, m.role, m.content, m.length, m.created_at, m.deleted_at";

impl MessageRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let role: String = row.get(2)?;
        let role = role
            .parse::<Role>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, e.into()))?;
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            role,
            content: row.get(3)?,
            length: row.get(4)?,
            created_at: from_db_time(5, &row.get::<_, String>(5)?)?,
            deleted_at: opt_from_db_time(6, row.get(6)?)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct MessageRepository {
    db: Database,
}

impl MessageRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert and return the new row id. The user row must exist.
    pub async fn create(&self, user_id: i64, role: Role, content: &str) -> Result<i64> {
        self.create_at(user_id, role, content, Utc::now()).await
    }

    pub async fn create_at(
        &self,
        user_id: i64,
        role: Role,
        content: &str,
        at: DateTime<Utc>,
    ) -> Result<i64> {
        let content = content.to_owned();
        self.db
            .call(move |conn| {
                let length = content.chars().count() as i64;
                conn.execute(
                    "INSERT INTO messages (user_id, role, content, length, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![user_id, role.as_str(), content, length, to_db_time(at)],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
    }

    /// Live messages for `user_id`, most recent first.
    pub async fn get_recent(&self, user_id: i64, limit: usize) -> Result<Vec<MessageRecord>> {
        let limit = limit as i64;
        self.db
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {COLUMNS} FROM messages m \
                     WHERE m.user_id = ?1 AND m.deleted_at IS NULL \
                     ORDER BY m.created_at DESC, m.id DESC LIMIT ?2"
                ))?;
                let rows = stmt
                    .query_map(params![user_id, limit], MessageRecord::from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await
    }

    pub async fn soft_delete(&self, id: i64) -> Result<bool> {
        let stamp = to_db_time(Utc::now());
        self.db
            .call(move |conn| {
                let n = conn.execute(
                    "UPDATE messages SET deleted_at = ?2 WHERE id = ?1 AND deleted_at IS NULL",
                    params![id, stamp],
                )?;
                Ok(n > 0)
            })
            .await
    }

    /// Used by `/clear`. Returns how many messages were marked.
    pub async fn soft_delete_all_for_user(&self, user_id: i64) -> Result<usize> {
        let stamp = to_db_time(Utc::now());
        self.db
            .call(move |conn| {
                Ok(conn.execute(
                    "UPDATE messages SET deleted_at = ?2 WHERE user_id = ?1 AND deleted_at IS NULL",
                    params![user_id, stamp],
                )?)
            })
            .await
    }

    /// Full-text search over live messages, most recent first. Every word of
    /// `query` must appear; FTS5 operators in the input are treated literally.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<MessageRecord>> {
        let Some(fts_query) = to_fts_query(query) else {
            return Ok(Vec::new());
        };
        let limit = limit as i64;
        self.db
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {COLUMNS} FROM messages m \
                     JOIN messages_fts fts ON m.id = fts.rowid \
                     WHERE messages_fts MATCH ?1 AND m.deleted_at IS NULL \
                     ORDER BY m.created_at DESC, m.id DESC LIMIT ?2"
                ))?;
                let rows = stmt
                    .query_map(params![fts_query, limit], MessageRecord::from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await
    }
}

fn to_fts_query(raw: &str) -> Option<String> {
    let terms: Vec<String> = raw
        .split_whitespace()
        .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
        .collect();
    (!terms.is_empty()).then(|| terms.join(" "))
}
