//! Per-message workflow.
//!
//! `Received -> Validated -> ContextBuilt -> ModelCalled -> Persisted -> Replied`,
//! with `ModelCalled -> RolledBack` when the model call fails or times out.
//! A rolled-back request leaves the history exactly as it found it.

use crate::context_window::ContextWindow;
use crate::locks::{KeyGuard, KeyedLocks};
use crate::manager::SessionStore;
use crate::session::Identity;
use crate::traits::{LanguageModel, SystemPrompt, Transcript};
use crate::validator::MessageValidator;
use pv_core::error::GENERIC_FAILURE_MESSAGE;
use pv_core::{PvError, Role, SessionSettings, SystemPromptMode, Turn};
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(60);

/// One inbound chat event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub user_id: i64,
    pub handle: Option<String>,
    pub display_name: String,
    /// `None` when the event carried no text.
    pub text: Option<String>,
}

impl InboundMessage {
    pub fn text(user_id: i64, display_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            user_id,
            handle: None,
            display_name: display_name.into(),
            text: Some(text.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Received,
    Validated,
    ContextBuilt,
    ModelCalled,
    Persisted,
    Replied,
    RolledBack,
}

/// What the transport should send back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Input refused before any state was touched.
    Rejected(String),
    /// Model answered. `turns` is the history length afterwards (0 if the
    /// conversation was evicted while the model was thinking).
    Replied { reply: String, turns: usize },
    /// Model failed; the user turn was rolled back.
    Failed(String),
}

impl Outcome {
    /// Text to deliver to the user.
    pub fn message(&self) -> &str {
        match self {
            Outcome::Rejected(msg) | Outcome::Failed(msg) => msg,
            Outcome::Replied { reply, .. } => reply,
        }
    }

    pub fn is_replied(&self) -> bool {
        matches!(self, Outcome::Replied { .. })
    }
}

pub struct Orchestrator {
    store: Arc<SessionStore>,
    model: Arc<dyn LanguageModel>,
    prompt: Arc<dyn SystemPrompt>,
    mode: SystemPromptMode,
    window: ContextWindow,
    validator: MessageValidator,
    timeout: Duration,
    locks: KeyedLocks,
    transcript: Option<Arc<dyn Transcript>>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<SessionStore>,
        model: Arc<dyn LanguageModel>,
        prompt: Arc<dyn SystemPrompt>,
        settings: &SessionSettings,
    ) -> Self {
        Self {
            store,
            model,
            prompt,
            mode: settings.prompt_mode,
            window: ContextWindow::new(settings.max_context_messages),
            validator: MessageValidator::new(settings.max_message_length),
            timeout: DEFAULT_MODEL_TIMEOUT,
            locks: KeyedLocks::new(),
            transcript: None,
        }
    }

    /// Upper bound on one model call. Expiry is handled like an API error.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_transcript(mut self, transcript: Arc<dyn Transcript>) -> Self {
        self.transcript = Some(transcript);
        self
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn prompt_mode(&self) -> SystemPromptMode {
        self.mode
    }

    pub fn prompt(&self) -> &Arc<dyn SystemPrompt> {
        &self.prompt
    }

    /// Hold this while mutating a user's state outside `handle_message`
    /// (e.g. clearing history) so it cannot interleave with a request.
    pub async fn lock_user(&self, user_id: i64) -> KeyGuard<'_> {
        self.locks.lock(user_id).await
    }

    /// System prompt for this identity under the configured mode.
    pub fn system_prompt_for(&self, identity: &Identity) -> String {
        match self.mode {
            SystemPromptMode::PerUser => identity.role().to_string(),
            SystemPromptMode::Deployment => self.prompt.get_system_prompt(),
        }
    }

    /// Runs inside a `request` span carrying a fresh request id.
    pub async fn handle_message(&self, message: &InboundMessage) -> Outcome {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("request", %request_id, user_id = message.user_id);
        self.process(message).instrument(span).await
    }

    async fn process(&self, message: &InboundMessage) -> Outcome {
        let user_id = message.user_id;
        transition(user_id, RequestState::Received);

        let text = match self.validator.validate(message.text.as_deref()) {
            Ok(()) => message.text.as_deref().unwrap_or_default(),
            Err(rejection) => return Outcome::Rejected(PvError::from(rejection).user_message()),
        };

        let _guard = self.locks.lock(user_id).await;
        transition(user_id, RequestState::Validated);

        let identity =
            self.store
                .get_or_create_identity(user_id, message.handle.as_deref(), &message.display_name);
        let system_prompt = self.system_prompt_for(&identity);
        let user_turn = Turn::user(text);

        let (index, context) = self.store.with_conversation_or_create(user_id, |conversation| {
            let index = conversation.append(Role::User, text);
            (index, self.window.build(conversation.turns(), &system_prompt))
        });
        transition(user_id, RequestState::ContextBuilt);

        tracing::info!(user_id, context_len = context.len(), "calling language model");
        let result = match tokio::time::timeout(self.timeout, self.model.send(&context)).await {
            Ok(result) => result,
            Err(_) => Err(PvError::Timeout(self.timeout)),
        };
        transition(user_id, RequestState::ModelCalled);

        match result {
            Ok(reply) => {
                let turns = self.store.with_conversation(user_id, |conversation| {
                    conversation.append(Role::Assistant, reply.as_str());
                    conversation.len()
                });
                match turns {
                    Some(_) => transition(user_id, RequestState::Persisted),
                    None => tracing::warn!(
                        user_id,
                        "conversation evicted during model call, reply not stored"
                    ),
                }

                if let Some(transcript) = &self.transcript {
                    let exchange = [user_turn, Turn::assistant(reply.as_str())];
                    if let Err(e) = transcript.record(&identity, &exchange).await {
                        tracing::warn!(user_id, error = %e, "failed to record transcript");
                    }
                }

                tracing::info!(user_id, response_len = reply.chars().count(), "processed message");
                transition(user_id, RequestState::Replied);
                Outcome::Replied { reply, turns: turns.unwrap_or(0) }
            }
            Err(err) => {
                tracing::error!(user_id, error = %err, "language model call failed");
                let retracted = self
                    .store
                    .with_conversation(user_id, |conversation| conversation.retract(index, &user_turn))
                    .flatten();
                if retracted.is_none() {
                    tracing::debug!(user_id, "user turn already gone, nothing to roll back");
                }
                transition(user_id, RequestState::RolledBack);
                Outcome::Failed(GENERIC_FAILURE_MESSAGE.to_string())
            }
        }
    }
}

fn transition(user_id: i64, state: RequestState) {
    tracing::debug!(user_id, ?state, "request state");
}
