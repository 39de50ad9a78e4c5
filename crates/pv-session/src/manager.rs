//! Process-wide session state: one identity cache and one conversation cache.

use crate::cache::BoundedTtlCache;
use crate::clock::{Clock, SystemClock};
use crate::session::{Conversation, Identity};
use parking_lot::Mutex;
use pv_core::{SessionSettings, Turn};
use serde::Serialize;
use std::sync::Arc;

/// Sizes of both caches, as seen by the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub identities: usize,
    pub conversations: usize,
    pub max_size: usize,
    pub ttl_hours: u64,
}

/// Explicitly constructed store shared as `Arc<SessionStore>`.
///
/// Access is closure-scoped: each call locks one cache, runs synchronously and
/// releases the lock before returning, so no guard is ever held across an await.
pub struct SessionStore {
    identities: Mutex<BoundedTtlCache<Identity>>,
    conversations: Mutex<BoundedTtlCache<Conversation>>,
    default_role: String,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    pub fn new(settings: &SessionSettings) -> Self {
        Self::with_clock(settings, Arc::new(SystemClock))
    }

    pub fn with_clock(settings: &SessionSettings, clock: Arc<dyn Clock>) -> Self {
        tracing::info!(
            max_size = settings.max_store_size,
            ttl_hours = settings.store_ttl_hours,
            "initializing session store"
        );
        Self {
            identities: Mutex::new(BoundedTtlCache::with_clock(
                "identities",
                settings.max_store_size,
                settings.store_ttl_hours,
                clock.clone(),
            )),
            conversations: Mutex::new(BoundedTtlCache::with_clock(
                "conversations",
                settings.max_store_size,
                settings.store_ttl_hours,
                clock.clone(),
            )),
            default_role: settings.default_system_prompt.clone(),
            clock,
        }
    }

    pub fn default_role(&self) -> &str {
        &self.default_role
    }

    // ========== Identities ==========

    /// Fetch or lazily create the identity, then run `f` on it.
    /// A new identity starts with the configured default role.
    pub fn with_identity_or_create<R>(
        &self,
        user_id: i64,
        handle: Option<&str>,
        display_name: &str,
        f: impl FnOnce(&mut Identity) -> R,
    ) -> R {
        let mut cache = self.identities.lock();
        let identity = cache.get_or_create(user_id, || {
            Identity::new(
                user_id,
                handle.map(str::to_string),
                display_name,
                self.default_role.as_str(),
                self.clock.now(),
            )
        });
        f(identity)
    }

    pub fn with_identity<R>(&self, user_id: i64, f: impl FnOnce(&mut Identity) -> R) -> Option<R> {
        self.identities.lock().get(user_id).map(f)
    }

    /// Snapshot of the identity, created if absent.
    pub fn get_or_create_identity(&self, user_id: i64, handle: Option<&str>, display_name: &str) -> Identity {
        self.with_identity_or_create(user_id, handle, display_name, |identity| identity.clone())
    }

    pub fn identity(&self, user_id: i64) -> Option<Identity> {
        self.with_identity(user_id, |identity| identity.clone())
    }

    /// Explicit role update. Returns `false` when the identity is absent.
    pub fn set_role(&self, user_id: i64, role: &str) -> bool {
        let updated = self.with_identity(user_id, |identity| identity.set_role(role)).is_some();
        if updated {
            tracing::info!(user_id, "role updated");
        }
        updated
    }

    // ========== Conversations ==========

    pub fn with_conversation_or_create<R>(&self, user_id: i64, f: impl FnOnce(&mut Conversation) -> R) -> R {
        let mut cache = self.conversations.lock();
        f(cache.get_or_create(user_id, || Conversation::new(user_id, self.clock.now())))
    }

    pub fn with_conversation<R>(&self, user_id: i64, f: impl FnOnce(&mut Conversation) -> R) -> Option<R> {
        self.conversations.lock().get(user_id).map(f)
    }

    /// Up to `limit` turns, most recent first. `None` when no live conversation exists.
    pub fn get_recent(&self, user_id: i64, limit: usize) -> Option<Vec<Turn>> {
        self.with_conversation(user_id, |conversation| conversation.recent(limit))
    }

    /// Truncate the history in place; the entry itself stays cached.
    pub fn clear_history(&self, user_id: i64) -> usize {
        let removed = self
            .with_conversation(user_id, Conversation::truncate)
            .unwrap_or(0);
        if removed > 0 {
            tracing::info!(user_id, removed, "cleared conversation history");
        }
        removed
    }

    // ========== Maintenance ==========

    /// Full expiry sweep of both caches. Returns the number of entries dropped.
    pub fn purge_expired(&self) -> usize {
        let identities = self.identities.lock().purge_expired();
        let conversations = self.conversations.lock().purge_expired();
        identities + conversations
    }

    pub fn stats(&self) -> StoreStats {
        let identities = self.identities.lock();
        let conversations = self.conversations.lock();
        StoreStats {
            identities: identities.len(),
            conversations: conversations.len(),
            max_size: identities.max_size(),
            ttl_hours: identities.ttl_hours(),
        }
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("identities", &*self.identities.lock())
            .field("conversations", &*self.conversations.lock())
            .finish()
    }
}
