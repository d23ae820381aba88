pub mod config;
pub mod dispatch;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod persistence;
pub mod session;

pub use dispatch::ReplyDispatcher;
pub use domain::conversation::{
    render_history_json, Conversation, ConversationSet, Role, Turn, DEFAULT_CONVERSATION_LABEL,
    GREETING,
};
pub use domain::decision::{AgentKind, ClassificationDecision, ServiceKind};
pub use domain::reply::{Reply, FALLBACK_REPLY};
pub use errors::{ApplicationError, DispatchError, DomainError, InterfaceError, StoreError};
pub use persistence::ConversationStore;
pub use session::{ChatSession, ReplyOutcome};
