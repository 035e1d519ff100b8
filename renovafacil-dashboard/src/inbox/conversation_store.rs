use chrono::{DateTime, Utc};
use shared_types::Conversation;

use crate::database::conversation_cache;
use crate::database::LocalStore;

/// In-memory conversation list plus its persisted copy.
///
/// Every successful refresh replaces the list wholesale. Refreshes are not
/// sequenced, so when two overlap the one that completes last wins even if
/// it was issued first.
#[derive(Debug, Clone, Default)]
pub struct ConversationStore {
    conversations: Vec<Conversation>,
    loading: bool,
    refreshed_at: Option<DateTime<Utc>>,
}

impl ConversationStore {
    /// Starts from whatever list was cached by a previous session
    pub fn load_cached(store: &LocalStore) -> Self {
        let conversations = conversation_cache::load_conversations(store);
        tracing::debug!(count = conversations.len(), "loaded cached conversations");
        Self {
            conversations,
            ..Self::default()
        }
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn find(&self, phone: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.phone == phone)
    }

    pub fn latest_message_time(&self, phone: &str) -> Option<DateTime<Utc>> {
        self.find(phone).map(|c| c.last_message_time)
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    /// Replaces the list with a fresh backend response and persists it.
    /// A failed write is logged; the in-memory list is still updated.
    pub fn apply(&mut self, conversations: Vec<Conversation>, store: &LocalStore) {
        if let Err(e) = conversation_cache::save_conversations(store, &conversations) {
            tracing::warn!("Failed to persist conversation list: {}", e);
        }
        self.conversations = conversations;
        self.loading = false;
        self.refreshed_at = Some(Utc::now());
    }
}
