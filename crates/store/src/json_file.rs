use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use cleanerio_core::{render_history_json, ConversationSet, ConversationStore, StoreError};

use crate::validate_user_id;

pub const HISTORY_FILE_NAME: &str = "conversations_history.json";

/// Stores each user's conversations as one JSON document at
/// `<root>/<user_id>/conversations_history.json`.
#[derive(Clone, Debug)]
pub struct JsonFileConversationStore {
    root: PathBuf,
}

impl JsonFileConversationStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn history_path(&self, user_id: &str) -> Result<PathBuf, StoreError> {
        validate_user_id(user_id)?;
        Ok(self.root.join(user_id).join(HISTORY_FILE_NAME))
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io { path: path.to_path_buf(), source }
}

#[async_trait::async_trait]
impl ConversationStore for JsonFileConversationStore {
    async fn load(&self, user_id: &str) -> Result<ConversationSet, StoreError> {
        let path = self.history_path(user_id)?;
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                debug!(
                    event_name = "store.history_missing",
                    user_id = %user_id,
                    "no stored history; using seeded conversations"
                );
                return Ok(ConversationSet::seeded());
            }
            Err(error) => return Err(io_error(&path)(error)),
        };

        let conversations: ConversationSet = serde_json::from_slice(&raw)
            .map_err(|source| StoreError::Decode { path: path.clone(), source })?;
        if conversations.is_empty() {
            return Ok(ConversationSet::seeded());
        }
        Ok(conversations)
    }

    async fn save(&self, user_id: &str, conversations: &ConversationSet) -> Result<(), StoreError> {
        let path = self.history_path(user_id)?;
        let directory = self.root.join(user_id);
        tokio::fs::create_dir_all(&directory).await.map_err(io_error(&directory))?;

        // write-then-rename so a crash never leaves a truncated document
        let body = render_history_json(conversations).map_err(StoreError::Encode)?;
        let staging = directory.join(format!("{HISTORY_FILE_NAME}.tmp"));
        tokio::fs::write(&staging, body).await.map_err(io_error(&staging))?;
        tokio::fs::rename(&staging, &path).await.map_err(io_error(&path))?;

        info!(
            event_name = "store.history_saved",
            user_id = %user_id,
            conversations = conversations.len(),
            "conversation history saved"
        );
        Ok(())
    }
}
