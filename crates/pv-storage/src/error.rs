use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Storage invariant violated: {0}")]
    Invariant(String),
    #[error("Blocking task failed: {0}")]
    Task(String),
}

impl From<StorageError> for pv_core::PvError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Invariant(msg) => pv_core::PvError::Invariant(msg),
            other => pv_core::PvError::Storage(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;
