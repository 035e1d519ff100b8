use shared_types::Conversation;

use super::LocalStore;
use crate::error::StoreError;

const CONVERSATIONS_KEY: &str = "inbox.conversations";

pub fn save_conversations(
    store: &LocalStore,
    conversations: &[Conversation],
) -> Result<(), StoreError> {
    store.set(CONVERSATIONS_KEY, conversations)
}

/// Last-known conversation list, or empty when nothing usable is cached
pub fn load_conversations(store: &LocalStore) -> Vec<Conversation> {
    match store.get::<Vec<Conversation>>(CONVERSATIONS_KEY) {
        Ok(Some(conversations)) => conversations,
        Ok(None) => Vec::new(),
        Err(e) => {
            tracing::warn!("Ignoring cached conversation list: {}", e);
            Vec::new()
        }
    }
}
