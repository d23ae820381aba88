use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::dispatch::ReplyDispatcher;
use crate::domain::conversation::{render_history_json, Conversation, ConversationSet, Role, Turn};
use crate::domain::reply::FALLBACK_REPLY;
use crate::errors::{DispatchError, DomainError, StoreError};
use crate::flows::{
    ChatFlow, FlowAction, FlowContext, FlowEngine, FlowEvent, FlowState, FlowTransitionError,
};
use crate::persistence::ConversationStore;

/// Result of one `generate_reply` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplyOutcome {
    /// Text appended as the assistant turn.
    pub reply: String,
    /// Set when the agent path failed and the apology was appended instead.
    pub degraded: Option<DispatchError>,
}

/// Conversation state owned by one connected user.
///
/// Exactly one conversation is active and its label is always present in the
/// set. Reply generation takes `&mut self`, so a session can never have two
/// generations in flight.
pub struct ChatSession {
    user_id: String,
    conversations: ConversationSet,
    active: String,
    created_count: usize,
    state: FlowState,
    flow: FlowEngine<ChatFlow>,
    dispatcher: Arc<dyn ReplyDispatcher>,
    store: Arc<dyn ConversationStore>,
    cancel: CancellationToken,
}

impl ChatSession {
    pub async fn open(
        user_id: impl Into<String>,
        dispatcher: Arc<dyn ReplyDispatcher>,
        store: Arc<dyn ConversationStore>,
    ) -> Result<Self, StoreError> {
        let user_id = user_id.into();
        let conversations = store.load(&user_id).await?;
        info!(
            event_name = "session.opened",
            user_id = %user_id,
            conversations = conversations.len(),
            "chat session opened"
        );
        Ok(Self::from_conversations(user_id, conversations, dispatcher, store))
    }

    pub fn from_conversations(
        user_id: impl Into<String>,
        conversations: ConversationSet,
        dispatcher: Arc<dyn ReplyDispatcher>,
        store: Arc<dyn ConversationStore>,
    ) -> Self {
        let conversations =
            if conversations.is_empty() { ConversationSet::seeded() } else { conversations };
        let active = conversations.first_label().unwrap_or_default().to_string();
        let flow = FlowEngine::new(ChatFlow);
        let state = match conversations.get(&active) {
            Some(conversation) if conversation.awaiting_reply() => FlowState::AwaitingReply,
            _ => flow.initial_state(),
        };

        Self {
            user_id: user_id.into(),
            created_count: conversations.len(),
            conversations,
            active,
            state,
            flow,
            dispatcher,
            store,
            cancel: CancellationToken::new(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn conversations(&self) -> &ConversationSet {
        &self.conversations
    }

    pub fn active_label(&self) -> &str {
        &self.active
    }

    pub fn active_conversation(&self) -> Option<&Conversation> {
        self.conversations.get(&self.active)
    }

    /// True when the active conversation ends with an unanswered user turn.
    pub fn needs_reply(&self) -> bool {
        self.state == FlowState::AwaitingReply
    }

    /// Token cancelled when the session is closed or dropped.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn create_conversation(&mut self, label: impl Into<String>) -> Result<(), DomainError> {
        let label = label.into();
        self.conversations.insert(label.clone(), Conversation::seeded())?;
        self.created_count += 1;
        self.active = label;
        self.apply(FlowEvent::ConversationCreated)?;
        Ok(())
    }

    /// Creates `Conversation N` with the next unused number and returns its label.
    pub fn create_next_conversation(&mut self) -> Result<String, DomainError> {
        let label = self.conversations.next_default_label(self.created_count);
        self.create_conversation(label.clone())?;
        Ok(label)
    }

    pub fn select_conversation(&mut self, label: &str) -> Result<(), DomainError> {
        if !self.conversations.contains(label) {
            return Err(DomainError::ConversationNotFound { label: label.to_string() });
        }
        self.active = label.to_string();
        self.apply(FlowEvent::ConversationSelected)?;
        Ok(())
    }

    pub fn delete_conversation(&mut self, label: &str) -> Result<(), DomainError> {
        self.conversations.remove(label)?;
        if self.conversations.is_empty() {
            self.conversations = ConversationSet::seeded();
            self.created_count = self.conversations.len();
        }
        self.active = self.conversations.first_label().unwrap_or_default().to_string();
        self.apply(FlowEvent::ConversationDeleted)?;
        Ok(())
    }

    pub fn submit_user_message(&mut self, text: impl Into<String>) -> Result<(), DomainError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(DomainError::BlankMessage);
        }
        let transition =
            self.flow.apply(&self.state, &FlowEvent::UserMessageSubmitted, &FlowContext::default())?;
        self.active_conversation_mut()?.push(Turn::user(text));
        self.state = transition.to;
        Ok(())
    }

    /// Answers the pending user turn of the active conversation.
    ///
    /// Dispatch failures never escape: the apology is appended instead and the
    /// cause is reported in [`ReplyOutcome::degraded`]. The whole set is saved
    /// afterwards; a failed save is logged and does not fail the reply.
    pub async fn generate_reply(&mut self) -> Result<ReplyOutcome, DomainError> {
        let transition =
            self.flow.apply(&self.state, &FlowEvent::ReplyAppended, &FlowContext::default())?;
        let prompt = self
            .active_conversation()
            .and_then(|conversation| conversation.last_turn())
            .filter(|turn| turn.role == Role::User)
            .map(|turn| turn.content.clone())
            .ok_or(FlowTransitionError::InvalidTransition {
                state: self.state,
                event: FlowEvent::ReplyAppended,
            })?;

        let correlation_id = Uuid::new_v4().to_string();
        let cancel = self.cancel.child_token();
        let result = self.dispatcher.dispatch(&prompt, &cancel).await;
        let (reply, degraded) = match result {
            Ok(reply) => (reply.into_text(), None),
            Err(error) => {
                warn!(
                    event_name = "session.reply_degraded",
                    correlation_id = %correlation_id,
                    user_id = %self.user_id,
                    conversation = %self.active,
                    error = %error,
                    "reply generation failed; appending apology"
                );
                (FALLBACK_REPLY.to_string(), Some(error))
            }
        };

        self.active_conversation_mut()?.push(Turn::assistant(reply.clone()));
        self.state = transition.to;
        info!(
            event_name = "session.reply_appended",
            correlation_id = %correlation_id,
            user_id = %self.user_id,
            conversation = %self.active,
            degraded = degraded.is_some(),
            "assistant reply appended"
        );

        if transition.actions.contains(&FlowAction::PersistConversations) {
            if let Err(error) = self.persist().await {
                warn!(
                    event_name = "session.persist_failed",
                    correlation_id = %correlation_id,
                    user_id = %self.user_id,
                    error = %error,
                    "conversation history could not be saved"
                );
            }
        }

        Ok(ReplyOutcome { reply, degraded })
    }

    pub async fn submit_and_reply(
        &mut self,
        text: impl Into<String>,
    ) -> Result<ReplyOutcome, DomainError> {
        self.submit_user_message(text)?;
        self.generate_reply().await
    }

    pub async fn persist(&self) -> Result<(), StoreError> {
        self.store.save(&self.user_id, &self.conversations).await
    }

    /// Pretty JSON of every conversation, named after the active label.
    pub fn export_active(&self) -> Result<(String, String), serde_json::Error> {
        let body = render_history_json(&self.conversations)?;
        Ok((format!("{}_history.json", self.active), body))
    }

    fn active_conversation_mut(&mut self) -> Result<&mut Conversation, DomainError> {
        let label = self.active.clone();
        self.conversations
            .get_mut(&label)
            .ok_or(DomainError::ConversationNotFound { label })
    }

    fn apply(&mut self, event: FlowEvent) -> Result<(), FlowTransitionError> {
        let context = FlowContext {
            active_awaiting_reply: self
                .active_conversation()
                .is_some_and(Conversation::awaiting_reply),
        };
        self.state = self.flow.apply(&self.state, &event, &context)?.to;
        Ok(())
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
