use std::collections::HashMap;

use tokio::sync::RwLock;

use cleanerio_core::{ConversationSet, ConversationStore, StoreError};

use crate::validate_user_id;

#[derive(Default)]
pub struct InMemoryConversationStore {
    sets: RwLock<HashMap<String, ConversationSet>>,
}

#[async_trait::async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn load(&self, user_id: &str) -> Result<ConversationSet, StoreError> {
        validate_user_id(user_id)?;
        let sets = self.sets.read().await;
        Ok(sets
            .get(user_id)
            .filter(|set| !set.is_empty())
            .cloned()
            .unwrap_or_else(ConversationSet::seeded))
    }

    async fn save(&self, user_id: &str, conversations: &ConversationSet) -> Result<(), StoreError> {
        validate_user_id(user_id)?;
        let mut sets = self.sets.write().await;
        sets.insert(user_id.to_string(), conversations.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use cleanerio_core::{Conversation, ConversationSet, ConversationStore, StoreError};

    use super::InMemoryConversationStore;

    #[tokio::test]
    async fn unknown_user_gets_seeded_set() {
        let store = InMemoryConversationStore::default();
        let set = store.load("alice").await.expect("load");
        assert_eq!(set, ConversationSet::seeded());
    }

    #[tokio::test]
    async fn saved_sets_are_isolated_per_user() {
        let store = InMemoryConversationStore::default();
        let mut set = ConversationSet::seeded();
        set.insert("Windows", Conversation::seeded()).expect("insert");

        store.save("alice", &set).await.expect("save");

        assert_eq!(store.load("alice").await.expect("alice").len(), 2);
        assert_eq!(store.load("bob").await.expect("bob").len(), 1);
    }

    #[tokio::test]
    async fn invalid_user_id_is_rejected() {
        let store = InMemoryConversationStore::default();
        assert!(matches!(store.load("../x").await, Err(StoreError::InvalidUserId(_))));
    }
}
