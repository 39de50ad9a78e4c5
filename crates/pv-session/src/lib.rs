//! In-memory session state and the per-message request workflow.

pub mod cache;
pub mod clock;
pub mod context_window;
pub mod locks;
pub mod manager;
pub mod orchestrator;
pub mod session;
pub mod traits;
pub mod validator;

pub use cache::BoundedTtlCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use context_window::{build_context, ContextWindow};
pub use locks::{KeyGuard, KeyedLocks};
pub use manager::{SessionStore, StoreStats};
pub use orchestrator::{InboundMessage, Orchestrator, Outcome, RequestState};
pub use session::{Conversation, Identity};
pub use traits::{describe_role, LanguageModel, StaticPrompt, SystemPrompt, Transcript};
pub use validator::MessageValidator;
