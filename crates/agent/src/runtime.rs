use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use cleanerio_core::config::{AppConfig, ConfigError};
use cleanerio_core::ReplyDispatcher;

use crate::availability::{AvailabilitySource, FixedAvailability};
use crate::guardrails::GuardrailAgent;
use crate::knowledge::{KnowledgeError, KnowledgeStore};
use crate::llm::CompletionOracle;
use crate::openai::OpenAiClient;
use crate::router::Router;
use crate::scheduler::SchedulerAgent;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Knowledge(#[from] KnowledgeError),
}

/// Wired router plus the shared knowledge store behind it.
#[derive(Clone)]
pub struct AgentRuntime {
    router: Arc<Router>,
    knowledge: KnowledgeStore,
}

impl AgentRuntime {
    /// Builds the provider client, opens (or builds) the knowledge index and
    /// wires both agents. Fails when the API key is missing.
    pub async fn from_config(
        config: &AppConfig,
        cancel: &CancellationToken,
    ) -> Result<Self, RuntimeError> {
        let client = Arc::new(OpenAiClient::from_config(&config.llm)?);
        let knowledge = KnowledgeStore::open(&config.knowledge, client.clone(), cancel).await?;
        let availability = Arc::new(FixedAvailability::new(config.availability.next_slot.clone()));
        Ok(Self::from_parts(client, knowledge, availability, config.knowledge.top_k))
    }

    pub fn from_parts(
        oracle: Arc<dyn CompletionOracle>,
        knowledge: KnowledgeStore,
        availability: Arc<dyn AvailabilitySource>,
        top_k: usize,
    ) -> Self {
        let scheduler =
            SchedulerAgent::new(oracle.clone(), Arc::new(knowledge.clone()), availability, top_k);
        let router = Router::new(oracle, GuardrailAgent, scheduler);
        Self { router: Arc::new(router), knowledge }
    }

    pub fn router(&self) -> Arc<Router> {
        self.router.clone()
    }

    pub fn dispatcher(&self) -> Arc<dyn ReplyDispatcher> {
        self.router.clone()
    }

    pub fn knowledge(&self) -> &KnowledgeStore {
        &self.knowledge
    }
}
