pub mod json_file;
pub mod memory;

pub use json_file::{JsonFileConversationStore, HISTORY_FILE_NAME};
pub use memory::InMemoryConversationStore;

use cleanerio_core::StoreError;

/// Rejects identities that could escape the per-user directory.
pub fn validate_user_id(user_id: &str) -> Result<(), StoreError> {
    let trimmed = user_id.trim();
    let unsafe_id = trimmed.is_empty()
        || trimmed != user_id
        || user_id.contains(['/', '\\', '\0'])
        || user_id == "."
        || user_id.contains("..");
    if unsafe_id {
        return Err(StoreError::InvalidUserId(user_id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::validate_user_id;

    #[test]
    fn email_addresses_are_valid_user_ids() {
        assert!(validate_user_id("alice@example.com").is_ok());
        assert!(validate_user_id("bob").is_ok());
    }

    #[test]
    fn path_like_user_ids_are_rejected() {
        for user_id in ["", " ", "../etc", "a/b", "a\\b", ".", " padded"] {
            assert!(validate_user_id(user_id).is_err(), "{user_id:?} should be rejected");
        }
    }
}
