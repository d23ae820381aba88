use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::reply::Reply;
use crate::errors::DispatchError;

/// Turns one user message into one reply.
///
/// Implementations must observe `cancel` around every network call and
/// return [`DispatchError::Cancelled`] once it fires.
#[async_trait]
pub trait ReplyDispatcher: Send + Sync {
    async fn dispatch(&self, text: &str, cancel: &CancellationToken)
        -> Result<Reply, DispatchError>;
}
