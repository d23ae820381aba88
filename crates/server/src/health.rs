use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

#[derive(Clone, Debug)]
pub struct HealthState {
    indexed_documents: usize,
    embedding_model: String,
}

impl HealthState {
    pub fn new(indexed_documents: usize, embedding_model: impl Into<String>) -> Self {
        Self { indexed_documents, embedding_model: embedding_model.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub knowledge: HealthCheck,
    pub indexed_documents: usize,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

/// Ready once the knowledge index holds at least one document.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let ready = state.indexed_documents > 0;
    let knowledge = if ready {
        HealthCheck {
            status: "ready",
            detail: format!(
                "{} documents indexed with {}",
                state.indexed_documents, state.embedding_model
            ),
        }
    } else {
        HealthCheck { status: "degraded", detail: "knowledge index is empty".to_string() }
    };

    let payload = HealthResponse {
        status: knowledge.status,
        knowledge,
        indexed_documents: state.indexed_documents,
    };
    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}
