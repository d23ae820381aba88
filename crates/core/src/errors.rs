use std::path::PathBuf;

use thiserror::Error;

use crate::flows::FlowTransitionError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("conversation `{label}` does not exist")]
    ConversationNotFound { label: String },
    #[error("conversation `{label}` already exists")]
    DuplicateConversation { label: String },
    #[error("conversation label must not be blank")]
    BlankLabel,
    #[error("message text must not be blank")]
    BlankMessage,
    #[error(transparent)]
    FlowTransition(#[from] FlowTransitionError),
}

/// Failures on the path from a user message to a reply.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("language model unavailable: {0}")]
    OracleUnavailable(String),
    #[error("knowledge store unavailable: {0}")]
    KnowledgeUnavailable(String),
    #[error("availability source unavailable: {0}")]
    AvailabilityUnavailable(String),
    #[error("malformed classification: {0}")]
    MalformedClassification(String),
    #[error("malformed scheduler response: {0}")]
    MalformedResponse(String),
    #[error("dispatch was cancelled")]
    Cancelled,
}

impl DispatchError {
    /// Transport and dependency outages; a retry later may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::OracleUnavailable(_)
                | Self::KnowledgeUnavailable(_)
                | Self::AvailabilityUnavailable(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid user id `{0}`")]
    InvalidUserId(String),
    #[error("could not access `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not decode conversations in `{path}`: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("could not encode conversations: {0}")]
    Encode(#[source] serde_json::Error),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl From<StoreError> for ApplicationError {
    fn from(value: StoreError) -> Self {
        Self::Persistence(value.to_string())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("bad gateway: {message}")]
    BadGateway { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::BadGateway { .. } => "The assistant returned an unusable answer.",
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::BadGateway { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::BadGateway { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let unassigned = || "unassigned".to_owned();
        match value {
            ApplicationError::Domain(error) => {
                Self::BadRequest { message: error.to_string(), correlation_id: unassigned() }
            }
            ApplicationError::Dispatch(
                error @ (DispatchError::MalformedClassification(_)
                | DispatchError::MalformedResponse(_)),
            ) => Self::BadGateway { message: error.to_string(), correlation_id: unassigned() },
            ApplicationError::Dispatch(error) => {
                Self::ServiceUnavailable { message: error.to_string(), correlation_id: unassigned() }
            }
            ApplicationError::Persistence(message) => {
                Self::ServiceUnavailable { message, correlation_id: unassigned() }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: unassigned() }
            }
        }
    }
}
