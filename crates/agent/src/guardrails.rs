use cleanerio_core::{Reply, ServiceKind};

pub const HANDOFF_REPLY: &str = "We're connecting you with a human agent.";
pub const NOT_OFFERED_REPLY: &str =
    "Sorry, we don't offer that service. We only offer post renovation cleaning.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GuardrailDecision {
    HumanHandoff,
    NotOffered,
}

impl GuardrailDecision {
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::HumanHandoff => "guardrail.human_handoff",
            Self::NotOffered => "guardrail.not_offered",
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::HumanHandoff => HANDOFF_REPLY,
            Self::NotOffered => NOT_OFFERED_REPLY,
        }
    }
}

/// Deterministic replies for everything the scheduler does not handle.
#[derive(Clone, Copy, Debug, Default)]
pub struct GuardrailAgent;

impl GuardrailAgent {
    /// Total over any service label: only `post_renovation_cleaning` goes to a
    /// human, everything else is declined.
    pub fn evaluate(&self, service: &str) -> GuardrailDecision {
        if service == ServiceKind::PostRenovationCleaning.as_str() {
            GuardrailDecision::HumanHandoff
        } else {
            GuardrailDecision::NotOffered
        }
    }

    pub fn respond(&self, service: &str) -> Reply {
        let decision = self.evaluate(service);
        tracing::debug!(
            event_name = "agent.guardrail_decision",
            service = %service,
            reason_code = decision.reason_code(),
            "guardrail reply selected"
        );
        Reply::new(decision.user_message())
    }
}
