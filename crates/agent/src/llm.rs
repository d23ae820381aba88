use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use cleanerio_core::DispatchError;

/// One structured-output completion: a system instruction and an optional
/// user message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: Option<String>,
}

impl CompletionRequest {
    pub fn system(system: impl Into<String>) -> Self {
        Self { system: system.into(), user: None }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum OracleError {
    #[error("request failed: {message}")]
    Transport { message: String, retryable: bool },
    #[error("provider returned {status}: {message}")]
    Status { status: u16, message: String, retryable: bool },
    #[error("provider response was unusable: {0}")]
    InvalidResponse(String),
    #[error("request was cancelled")]
    Cancelled,
}

impl OracleError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { retryable, .. } | Self::Status { retryable, .. } => *retryable,
            Self::InvalidResponse(_) | Self::Cancelled => false,
        }
    }
}

impl From<OracleError> for DispatchError {
    fn from(value: OracleError) -> Self {
        match value {
            OracleError::Cancelled => Self::Cancelled,
            other => Self::OracleUnavailable(other.to_string()),
        }
    }
}

/// Language-model endpoint used both to classify and to phrase replies.
///
/// Returns the raw JSON text the model produced; callers validate it.
#[async_trait]
pub trait CompletionOracle: Send + Sync {
    async fn complete_json(
        &self,
        request: &CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<String, OracleError>;
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Identifier stored alongside built indexes.
    fn model(&self) -> &str;

    /// One vector per input, in input order.
    async fn embed(
        &self,
        inputs: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<Vec<f32>>, OracleError>;
}

#[cfg(test)]
mod tests {
    use cleanerio_core::DispatchError;

    use super::{CompletionRequest, OracleError};

    #[test]
    fn cancellation_stays_distinct_from_outages() {
        assert_eq!(DispatchError::from(OracleError::Cancelled), DispatchError::Cancelled);
        let timeout = OracleError::Transport { message: "timed out".into(), retryable: true };
        assert!(matches!(DispatchError::from(timeout), DispatchError::OracleUnavailable(_)));
    }

    #[test]
    fn request_builder_sets_user_message() {
        let request = CompletionRequest::system("classify").with_user("hello");
        assert_eq!(request.user.as_deref(), Some("hello"));
    }
}
