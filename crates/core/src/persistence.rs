use async_trait::async_trait;

use crate::domain::conversation::ConversationSet;
use crate::errors::StoreError;

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Returns the stored set, or the seeded default when the user has none.
    async fn load(&self, user_id: &str) -> Result<ConversationSet, StoreError>;

    /// Replaces the user's stored set in full.
    async fn save(&self, user_id: &str, conversations: &ConversationSet) -> Result<(), StoreError>;
}
