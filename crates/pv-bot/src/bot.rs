//! Command routing and the Telegram poll loop.

use crate::logging::preview;
use crate::rate_limit::RateLimiter;
use crate::telegram::{TelegramClient, TgMessage, Update, POLL_TIMEOUT_SECS};
use pv_core::{PalaverConfig, PvError, SystemPromptMode};
use pv_session::{describe_role, InboundMessage, MessageValidator, Orchestrator};
use pv_storage::Database;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};

const POLL_BACKOFF: Duration = Duration::from_secs(5);

pub const HELP_TEXT: &str = "Available commands:\n\n\
/start - Start a conversation\n\
/clear - Clear conversation history\n\
/role - Show the assistant's role (/role <text> sets your own)\n\
/help - Show this message\n\n\
Just send me a message and I will help!";

pub const HISTORY_CLEARED: &str = "Conversation history cleared. Let's start over!";
pub const HISTORY_EMPTY: &str = "Conversation history is already empty.";
pub const ROLE_UPDATED: &str = "Role updated. It applies from your next message.";
pub const ROLE_FIXED: &str = "The role is fixed for this deployment and cannot be changed.";

/// A slash command and its argument text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    Start,
    Clear,
    Role(Option<&'a str>),
    Help,
}

impl<'a> Command<'a> {
    /// `None` for plain text and unknown commands; those go to the model.
    pub fn parse(text: &'a str) -> Option<Self> {
        let text = text.trim_start();
        let rest = text.strip_prefix('/')?;
        let (head, args) = match rest.split_once(char::is_whitespace) {
            Some((head, args)) => (head, args.trim()),
            None => (rest, ""),
        };
        // `/cmd@botname` is how group chats address a specific bot.
        let name = head.split('@').next().unwrap_or(head);
        match name {
            "start" => Some(Command::Start),
            "clear" => Some(Command::Clear),
            "role" => Some(Command::Role((!args.is_empty()).then_some(args))),
            "help" => Some(Command::Help),
            _ => None,
        }
    }
}

pub struct Bot {
    orchestrator: Orchestrator,
    database: Database,
    limiter: RateLimiter,
    validator: MessageValidator,
    welcome_message: String,
}

impl Bot {
    pub fn new(orchestrator: Orchestrator, database: Database, config: &PalaverConfig) -> Self {
        Self {
            orchestrator,
            database,
            limiter: RateLimiter::from_secs(config.bot.rate_limit_secs),
            validator: MessageValidator::new(config.session.max_message_length),
            welcome_message: config.bot.welcome_message.clone(),
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Reply text for one inbound message. Every message gets a reply.
    pub async fn respond(&self, message: &InboundMessage) -> String {
        let user_id = message.user_id;
        if let Err(wait) = self.limiter.check(user_id) {
            return format!("Please wait {wait} s before sending another message.");
        }

        let command = message.text.as_deref().and_then(Command::parse);
        match command {
            Some(Command::Start) => self.start(message).await,
            Some(Command::Clear) => self.clear(user_id).await,
            Some(Command::Role(args)) => self.role(message, args),
            Some(Command::Help) => HELP_TEXT.to_string(),
            None => {
                if let Some(text) = message.text.as_deref() {
                    tracing::info!(user_id, handle = ?message.handle, text = %preview(text), "received message");
                }
                self.orchestrator.handle_message(message).await.message().to_string()
            }
        }
    }

    async fn start(&self, message: &InboundMessage) -> String {
        let user_id = message.user_id;
        tracing::info!(user_id, handle = ?message.handle, "received /start");
        let identity = self.orchestrator.store().get_or_create_identity(
            user_id,
            message.handle.as_deref(),
            &message.display_name,
        );
        if let Err(e) = self
            .database
            .users()
            .get_or_create(user_id, message.handle.as_deref(), &message.display_name)
            .await
        {
            tracing::warn!(user_id, error = %e, "failed to record user");
        }
        format!("Hello, {}! {}", identity.display_name, self.welcome_message)
    }

    async fn clear(&self, user_id: i64) -> String {
        tracing::info!(user_id, "received /clear");
        let _guard = self.orchestrator.lock_user(user_id).await;
        let removed = self.orchestrator.store().clear_history(user_id);
        match self.database.messages().soft_delete_all_for_user(user_id).await {
            Ok(archived) => tracing::debug!(user_id, archived, "soft-deleted durable messages"),
            Err(e) => tracing::warn!(user_id, error = %e, "failed to soft-delete durable messages"),
        }
        if removed > 0 {
            HISTORY_CLEARED.to_string()
        } else {
            HISTORY_EMPTY.to_string()
        }
    }

    fn role(&self, message: &InboundMessage, args: Option<&str>) -> String {
        let user_id = message.user_id;
        tracing::info!(user_id, update = args.is_some(), "received /role");
        let store = self.orchestrator.store();
        match (self.orchestrator.prompt_mode(), args) {
            (SystemPromptMode::Deployment, None) => {
                format!("My role:\n\n{}", self.orchestrator.prompt().role_description())
            }
            (SystemPromptMode::Deployment, Some(_)) => ROLE_FIXED.to_string(),
            (SystemPromptMode::PerUser, None) => {
                let role = store
                    .identity(user_id)
                    .map(|identity| identity.role().to_string())
                    .unwrap_or_else(|| store.default_role().to_string());
                format!("My role:\n\n{}", describe_role(&role))
            }
            (SystemPromptMode::PerUser, Some(text)) => {
                if let Err(rejection) = self.validator.validate(Some(text)) {
                    return PvError::from(rejection).user_message();
                }
                store.get_or_create_identity(user_id, message.handle.as_deref(), &message.display_name);
                store.set_role(user_id, text);
                ROLE_UPDATED.to_string()
            }
        }
    }

    /// Respond and deliver. Delivery failures are logged and dropped.
    pub async fn dispatch(&self, telegram: &TelegramClient, message: InboundMessage) {
        let reply = self.respond(&message).await;
        if let Err(e) = telegram.send_message(message.user_id, &reply).await {
            tracing::error!(user_id = message.user_id, error = %e, "failed to deliver reply");
        }
    }

    /// Long-poll until `shutdown` flips to true. Each message is handled on
    /// its own task; per-user ordering is kept by the orchestrator's locks.
    /// Replies still in flight are awaited before returning.
    pub async fn run(self: Arc<Self>, telegram: TelegramClient, mut shutdown: watch::Receiver<bool>) {
        let telegram = Arc::new(telegram);
        let mut offset: i64 = 0;
        let mut in_flight = JoinSet::new();
        tracing::info!("telegram polling started");

        while !*shutdown.borrow() {
            let updates = tokio::select! {
                _ = shutdown.changed() => break,
                result = telegram.get_updates(offset, POLL_TIMEOUT_SECS) => result,
            };

            let updates = match updates {
                Ok(updates) => updates,
                Err(e) => {
                    tracing::warn!(error = %e, "telegram poll failed");
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = tokio::time::sleep(POLL_BACKOFF) => continue,
                    }
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);
                let Some(message) = inbound_from_update(update) else {
                    continue;
                };
                let bot = self.clone();
                let telegram = telegram.clone();
                in_flight.spawn(async move { bot.dispatch(&telegram, message).await });
            }
            while let Some(joined) = in_flight.try_join_next() {
                log_join(joined);
            }
        }

        tracing::info!(pending = in_flight.len(), "telegram polling stopped");
        while let Some(joined) = in_flight.join_next().await {
            log_join(joined);
        }
    }
}

fn log_join(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        tracing::error!(error = %e, "message task failed");
    }
}

/// Private-chat messages keyed by chat id. Updates without a sender are skipped.
pub fn inbound_from_update(update: Update) -> Option<InboundMessage> {
    let TgMessage { from, chat, text, .. } = update.message?;
    let from = from?;
    Some(InboundMessage {
        user_id: chat.id,
        handle: from.username,
        display_name: from.first_name,
        text,
    })
}
