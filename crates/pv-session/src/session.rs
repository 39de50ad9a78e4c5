use chrono::{DateTime, Utc};
use pv_core::{Role, Turn};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One end user, keyed by the transport's chat id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: i64,
    pub display_name: String,
    pub handle: Option<String>,
    role: String,
    pub created_at: DateTime<Utc>,
}

impl Identity {
    pub fn new(
        user_id: i64,
        handle: Option<String>,
        display_name: impl Into<String>,
        role: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
            handle,
            role: role.into(),
            created_at,
        }
    }

    /// Prompt fragment governing assistant behavior for this user.
    pub fn role(&self) -> &str {
        &self.role
    }

    /// The one place a role changes after creation.
    pub fn set_role(&mut self, role: impl Into<String>) {
        self.role = role.into();
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.handle {
            Some(handle) => write!(f, "Identity(id={}, @{}, {})", self.user_id, handle, self.display_name),
            None => write!(f, "Identity(id={}, {})", self.user_id, self.display_name),
        }
    }
}

/// Rolling message history for one user.
///
/// The stored history is unbounded; only the context sent to the model is windowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub user_id: i64,
    turns: Vec<Turn>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(user_id: i64, created_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            turns: Vec::new(),
            created_at,
        }
    }

    /// Append a turn and return its index.
    pub fn append(&mut self, role: Role, content: impl Into<String>) -> usize {
        self.turns.push(Turn::new(role, content));
        self.turns.len() - 1
    }

    /// Remove the turn at `index` only if it is still `expected`.
    pub fn retract(&mut self, index: usize, expected: &Turn) -> Option<Turn> {
        if self.turns.get(index) == Some(expected) {
            Some(self.turns.remove(index))
        } else {
            None
        }
    }

    /// Empty the history in place. Returns how many turns were dropped.
    pub fn truncate(&mut self) -> usize {
        let removed = self.turns.len();
        self.turns.clear();
        removed
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Up to `limit` turns, most recent first.
    pub fn recent(&self, limit: usize) -> Vec<Turn> {
        self.turns.iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Number of turns spoken by the user.
    pub fn user_turns(&self) -> usize {
        self.turns.iter().filter(|t| t.role == Role::User).count()
    }
}

impl fmt::Display for Conversation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Conversation(user={}, turns={})", self.user_id, self.turns.len())
    }
}
