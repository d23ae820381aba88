//! Agent runtime for the Cleaner.io assistant.
//!
//! A user message flows through a constrained loop:
//! 1. **Classification** (`router`) - the completion oracle labels the message
//!    with an agent and a service, validated against a strict schema.
//! 2. **Guardrail** (`guardrails`) - deterministic replies for services that
//!    are handed to a human or not offered.
//! 3. **Scheduling** (`scheduler`) - retrieves the price snippet from the
//!    knowledge index (`knowledge`), reads the next slot (`availability`) and
//!    asks the oracle for a grounded answer.
//!
//! # Safety Principle
//!
//! The oracle only phrases answers. Prices come from the corpus and slots come
//! from the availability source; neither is invented by the model.

pub mod availability;
#[cfg(test)]
mod embedding;
pub mod guardrails;
pub mod knowledge;
pub mod llm;
pub mod openai;
pub mod prompts;
pub mod retry;
pub mod router;
pub mod runtime;
pub mod scheduler;

pub use availability::{AvailabilitySource, FixedAvailability};
pub use guardrails::{GuardrailAgent, GuardrailDecision};
pub use knowledge::{
    Corpus, KnowledgeError, KnowledgeIndex, KnowledgeSearch, KnowledgeStore, RetrievedContext,
};
pub use llm::{CompletionOracle, CompletionRequest, EmbeddingProvider, OracleError};
pub use openai::OpenAiClient;
pub use retry::RetryPolicy;
pub use router::Router;
pub use runtime::{AgentRuntime, RuntimeError};
pub use scheduler::SchedulerAgent;
