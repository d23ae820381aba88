use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use cleanerio_core::{
    ApplicationError, DomainError, InterfaceError, Reply, ReplyDispatcher, FALLBACK_REPLY,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

pub const WELCOME_MESSAGE: &str = "This is the main endpoint for the Cleaner.io chatbot.";

#[derive(Clone)]
pub struct EnquiryState {
    dispatcher: Arc<dyn ReplyDispatcher>,
    shutdown: CancellationToken,
}

impl EnquiryState {
    pub fn new(dispatcher: Arc<dyn ReplyDispatcher>, shutdown: CancellationToken) -> Self {
        Self { dispatcher, shutdown }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct EnquiryRequest {
    pub content: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WelcomeResponse {
    #[serde(rename = "Welcome")]
    pub welcome: &'static str,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub correlation_id: String,
}

type Rejection = (StatusCode, Json<ErrorResponse>);

pub fn router(state: EnquiryState) -> Router {
    Router::new()
        .route("/", get(welcome))
        .route("/enquire", post(enquire))
        .route("/enquire/", post(enquire))
        .with_state(state)
}

pub async fn welcome() -> Json<WelcomeResponse> {
    Json(WelcomeResponse { welcome: WELCOME_MESSAGE })
}

/// Answers one message. Outages of the model or its data sources still
/// answer 200 with the apology; unusable model output and cancellation do not.
pub async fn enquire(
    State(state): State<EnquiryState>,
    Json(request): Json<EnquiryRequest>,
) -> Result<Json<Reply>, Rejection> {
    let correlation_id = Uuid::new_v4().to_string();

    if request.content.trim().is_empty() {
        return Err(reject(ApplicationError::from(DomainError::BlankMessage), correlation_id));
    }

    let cancel = state.shutdown.child_token();
    match state.dispatcher.dispatch(&request.content, &cancel).await {
        Ok(reply) => {
            info!(
                event_name = "http.enquire.answered",
                correlation_id = %correlation_id,
                "enquiry answered"
            );
            Ok(Json(reply))
        }
        Err(error) if error.is_recoverable() => {
            warn!(
                event_name = "http.enquire.degraded",
                correlation_id = %correlation_id,
                error = %error,
                "dependency unavailable, answering with apology"
            );
            Ok(Json(Reply::new(FALLBACK_REPLY)))
        }
        Err(error) => Err(reject(ApplicationError::from(error), correlation_id)),
    }
}

fn reject(error: ApplicationError, correlation_id: String) -> Rejection {
    let interface = error.into_interface(correlation_id);
    warn!(
        event_name = "http.enquire.rejected",
        correlation_id = %interface.correlation_id(),
        error = %interface,
        "enquiry rejected"
    );
    let status = status_for(&interface);
    (
        status,
        Json(ErrorResponse {
            error: interface.user_message(),
            correlation_id: interface.correlation_id().to_owned(),
        }),
    )
}

fn status_for(error: &InterfaceError) -> StatusCode {
    match error {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::BadGateway { .. } => StatusCode::BAD_GATEWAY,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
