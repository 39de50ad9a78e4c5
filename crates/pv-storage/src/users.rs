use crate::database::{from_db_time, opt_from_db_time, to_db_time, Database};
use crate::error::{Result, StorageError};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

/// A row of `users`. `id` is the chat platform's user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRecord {
    pub id: i64,
    pub handle: Option<String>,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl UserRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            handle: row.get(1)?,
            display_name: row.get(2)?,
            created_at: from_db_time(3, &row.get::<_, String>(3)?)?,
            last_accessed: from_db_time(4, &row.get::<_, String>(4)?)?,
            deleted_at: opt_from_db_time(5, row.get(5)?)?,
        })
    }
}

const SELECT_LIVE: &str = "SELECT id, username, first_name, created_at, last_accessed, deleted_at \
                           FROM users WHERE id = ?1 AND deleted_at IS NULL";

#[derive(Debug, Clone)]
pub struct UserRepository {
    db: Database,
}

impl UserRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn get_or_create(
        &self,
        id: i64,
        handle: Option<&str>,
        display_name: &str,
    ) -> Result<UserRecord> {
        self.get_or_create_at(id, handle, display_name, Utc::now()).await
    }

    /// Insert if absent, otherwise touch `last_accessed`. A soft-deleted user
    /// cannot be read back and yields `StorageError::Invariant`.
    pub async fn get_or_create_at(
        &self,
        id: i64,
        handle: Option<&str>,
        display_name: &str,
        now: DateTime<Utc>,
    ) -> Result<UserRecord> {
        let handle = handle.map(str::to_owned);
        let display_name = display_name.to_owned();
        self.db
            .call(move |conn| {
                let tx = conn.transaction()?;
                let stamp = to_db_time(now);
                tx.execute(
                    "INSERT OR IGNORE INTO users (id, username, first_name, created_at, last_accessed) \
                     VALUES (?1, ?2, ?3, ?4, ?4)",
                    params![id, handle, display_name, stamp],
                )?;
                tx.execute(
                    "UPDATE users SET last_accessed = ?2 WHERE id = ?1 AND deleted_at IS NULL",
                    params![id, stamp],
                )?;
                let user = select_live(&tx, id)?.ok_or_else(|| {
                    StorageError::Invariant(format!("failed to get or create user {id}"))
                })?;
                tx.commit()?;
                Ok(user)
            })
            .await
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<UserRecord>> {
        self.db.call(move |conn| select_live(conn, id)).await
    }

    pub async fn update_last_accessed(&self, id: i64) -> Result<()> {
        let stamp = to_db_time(Utc::now());
        self.db
            .call(move |conn| {
                conn.execute(
                    "UPDATE users SET last_accessed = ?2 WHERE id = ?1 AND deleted_at IS NULL",
                    params![id, stamp],
                )?;
                Ok(())
            })
            .await
    }

    /// Returns false if there was no such user.
    pub async fn soft_delete(&self, id: i64) -> Result<bool> {
        let stamp = to_db_time(Utc::now());
        self.db
            .call(move |conn| {
                let n = conn.execute(
                    "UPDATE users SET deleted_at = ?2 WHERE id = ?1",
                    params![id, stamp],
                )?;
                Ok(n > 0)
            })
            .await
    }
}

fn select_live(conn: &Connection, id: i64) -> Result<Option<UserRecord>> {
    Ok(conn.query_row(SELECT_LIVE, params![id], UserRecord::from_row).optional()?)
}
