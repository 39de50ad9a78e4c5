//! Application state shared across all handlers.

use pv_session::SessionStore;
use pv_storage::Database;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SessionStore>,
    pub database: Database,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(store: Arc<SessionStore>, database: Database) -> Self {
        Self { store, database, start_time: Instant::now() }
    }
}
