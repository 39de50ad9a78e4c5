//! Periodic housekeeping: session expiry, limiter pruning, prompt reload.

use crate::bot::Bot;
use crate::role::RoleManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

pub struct Maintenance {
    bot: Arc<Bot>,
    roles: Option<Arc<RoleManager>>,
}

impl Maintenance {
    pub fn new(bot: Arc<Bot>, roles: Option<Arc<RoleManager>>) -> Self {
        Self { bot, roles }
    }

    /// One pass. A prompt file that fails to reload leaves the old prompt in place.
    pub fn tick(&self) {
        let purged = self.bot.orchestrator().store().purge_expired();
        let pruned = self.bot.limiter().prune();
        if purged > 0 || pruned > 0 {
            tracing::info!(purged, pruned, "purged expired sessions");
        }
        if let Some(roles) = &self.roles {
            if let Err(e) = roles.reload() {
                tracing::warn!(path = %roles.path().display(), error = %e, "keeping previous system prompt");
            }
        }
    }

    /// Tick every `period` until `shutdown` changes. The first tick fires after one period.
    pub async fn run(self, period: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => self.tick(),
            }
        }
        tracing::debug!("maintenance stopped");
    }
}
