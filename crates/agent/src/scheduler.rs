use std::sync::Arc;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use cleanerio_core::{DispatchError, Reply};

use crate::availability::AvailabilitySource;
use crate::knowledge::KnowledgeSearch;
use crate::llm::{CompletionOracle, CompletionRequest};
use crate::prompts::scheduler_prompt;

#[derive(Deserialize)]
struct SchedulerOutput {
    response: String,
}

/// Answers scheduling requests from the retrieved price and the next slot.
#[derive(Clone)]
pub struct SchedulerAgent {
    oracle: Arc<dyn CompletionOracle>,
    knowledge: Arc<dyn KnowledgeSearch>,
    availability: Arc<dyn AvailabilitySource>,
    top_k: usize,
}

impl SchedulerAgent {
    pub fn new(
        oracle: Arc<dyn CompletionOracle>,
        knowledge: Arc<dyn KnowledgeSearch>,
        availability: Arc<dyn AvailabilitySource>,
        top_k: usize,
    ) -> Self {
        Self { oracle, knowledge, availability, top_k: top_k.max(1) }
    }

    pub async fn respond(
        &self,
        service: &str,
        cancel: &CancellationToken,
    ) -> Result<Reply, DispatchError> {
        let context = self.knowledge.search(service, self.top_k, cancel).await?;
        if context.is_empty() {
            // no grounding available; the oracle answers from the slot alone
            warn!(
                event_name = "agent.scheduler_empty_context",
                service = %service,
                "no knowledge snippet retrieved"
            );
        }
        let slot = self.availability.next_slot(cancel).await?;
        debug!(
            event_name = "agent.scheduler_grounding",
            service = %service,
            snippets = context.snippets.len(),
            slot = %slot,
            "scheduler grounding collected"
        );

        let request = CompletionRequest::system(scheduler_prompt(&context.joined(), &slot));
        let raw = self.oracle.complete_json(&request, cancel).await?;
        parse_scheduler_output(&raw)
    }
}

pub(crate) fn parse_scheduler_output(raw: &str) -> Result<Reply, DispatchError> {
    let output: SchedulerOutput = serde_json::from_str(raw)
        .map_err(|err| DispatchError::MalformedResponse(format!("{err}: {raw}")))?;
    let response = output.response.trim();
    if response.is_empty() {
        return Err(DispatchError::MalformedResponse("`response` is empty".to_string()));
    }
    Ok(Reply::new(response))
}
