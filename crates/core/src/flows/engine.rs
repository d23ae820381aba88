use thiserror::Error;

use crate::flows::states::{FlowAction, FlowContext, FlowEvent, FlowState, TransitionOutcome};

pub trait FlowDefinition {
    fn initial_state(&self) -> FlowState;
    fn transition(
        &self,
        current: &FlowState,
        event: &FlowEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>;
}

#[derive(Clone, Debug, Default)]
pub struct ChatFlow;

impl FlowDefinition for ChatFlow {
    fn initial_state(&self) -> FlowState {
        FlowState::Idle
    }

    fn transition(
        &self,
        current: &FlowState,
        event: &FlowEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_chat(current, event, context)
    }
}

#[derive(Clone, Debug, Default)]
pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn initial_state(&self) -> FlowState {
        self.flow.initial_state()
    }

    pub fn apply(
        &self,
        current: &FlowState,
        event: &FlowEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        let result = self.flow.transition(current, event, context);
        match &result {
            Ok(outcome) => tracing::debug!(
                event_name = "flow.transition_applied",
                from = ?outcome.from,
                to = ?outcome.to,
                flow_event = ?outcome.event,
                "chat flow transition applied"
            ),
            Err(error) => tracing::debug!(
                event_name = "flow.transition_rejected",
                error = %error,
                "chat flow transition rejected"
            ),
        }
        result
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: FlowState, event: FlowEvent },
}

fn transition_chat(
    current: &FlowState,
    event: &FlowEvent,
    context: &FlowContext,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use FlowAction::{DispatchReply, PersistConversations};
    use FlowEvent::{
        ConversationCreated, ConversationDeleted, ConversationSelected, ReplyAppended,
        UserMessageSubmitted,
    };
    use FlowState::{AwaitingReply, Idle};

    let (to, actions) = match (current, event) {
        // a fresh conversation always ends with the greeting
        (_, ConversationCreated) => (Idle, Vec::new()),
        (_, ConversationSelected) | (_, ConversationDeleted) => {
            if context.active_awaiting_reply {
                (AwaitingReply, vec![DispatchReply])
            } else {
                (Idle, Vec::new())
            }
        }
        (Idle, UserMessageSubmitted) => (AwaitingReply, vec![DispatchReply]),
        (AwaitingReply, ReplyAppended) => (Idle, vec![PersistConversations]),
        _ => {
            return Err(FlowTransitionError::InvalidTransition {
                state: *current,
                event: *event,
            });
        }
    };

    Ok(TransitionOutcome { from: *current, to, event: *event, actions })
}
