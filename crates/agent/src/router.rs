use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use cleanerio_core::{
    AgentKind, ClassificationDecision, DispatchError, Reply, ReplyDispatcher, ServiceKind,
};

use crate::guardrails::GuardrailAgent;
use crate::llm::{CompletionOracle, CompletionRequest};
use crate::prompts::CLASSIFIER_PROMPT;
use crate::scheduler::SchedulerAgent;

#[derive(Deserialize)]
struct RawClassification {
    agent: String,
    service: String,
}

/// Classifies each message and hands it to the matching agent.
#[derive(Clone)]
pub struct Router {
    oracle: Arc<dyn CompletionOracle>,
    guardrail: GuardrailAgent,
    scheduler: SchedulerAgent,
}

impl Router {
    pub fn new(
        oracle: Arc<dyn CompletionOracle>,
        guardrail: GuardrailAgent,
        scheduler: SchedulerAgent,
    ) -> Self {
        Self { oracle, guardrail, scheduler }
    }

    pub async fn classify(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<ClassificationDecision, DispatchError> {
        let request = CompletionRequest::system(CLASSIFIER_PROMPT).with_user(text);
        let raw = self.oracle.complete_json(&request, cancel).await?;
        parse_classification(&raw)
    }
}

/// Strict schema check of the classifier output; nothing is defaulted.
pub(crate) fn parse_classification(raw: &str) -> Result<ClassificationDecision, DispatchError> {
    let malformed = |detail: String| DispatchError::MalformedClassification(detail);

    let parsed: RawClassification =
        serde_json::from_str(raw).map_err(|err| malformed(format!("{err}: {raw}")))?;
    let agent = parsed.agent.parse::<AgentKind>().map_err(malformed)?;
    let service = parsed.service.parse::<ServiceKind>().map_err(malformed)?;
    ClassificationDecision::new(agent, service).map_err(malformed)
}

#[async_trait]
impl ReplyDispatcher for Router {
    async fn dispatch(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<Reply, DispatchError> {
        let decision = self.classify(text, cancel).await?;
        info!(
            event_name = "agent.message_classified",
            agent = %decision.agent(),
            service = %decision.service(),
            "message classified"
        );

        match decision.agent() {
            AgentKind::Scheduler => self.scheduler.respond(decision.service().as_str(), cancel).await,
            AgentKind::Guardrail => Ok(self.guardrail.respond(decision.service().as_str())),
        }
    }
}
