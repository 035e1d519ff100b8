use chrono::{DateTime, Utc};
use shared_types::Conversation;

use crate::database::read_markers;
use crate::database::LocalStore;
use crate::error::StoreError;

pub type Clock = fn() -> DateTime<Utc>;

/// Client-side unread heuristic. The backend has no read state; a
/// conversation is unread when its latest message is incoming and newer than
/// the last time the operator opened it here.
#[derive(Clone)]
pub struct UnreadTracker {
    store: LocalStore,
    clock: Clock,
}

impl UnreadTracker {
    pub fn new(store: LocalStore) -> Self {
        Self::with_clock(store, Utc::now)
    }

    pub fn with_clock(store: LocalStore, clock: Clock) -> Self {
        Self { store, clock }
    }

    pub fn last_read(&self, phone: &str) -> Option<i64> {
        match read_markers::get_last_read(&self.store, phone) {
            Ok(marker) => marker,
            Err(e) => {
                tracing::warn!("Failed to read marker for {}: {}", phone, e);
                None
            }
        }
    }

    pub fn is_unread(&self, conversation: &Conversation) -> bool {
        is_unread_with(conversation, self.last_read(&conversation.phone))
    }

    /// Records the conversation as read now. `latest_seen` is the newest
    /// message time known for the phone; the marker never lands before it,
    /// so a backend clock running ahead cannot leave the conversation unread.
    pub fn mark_as_read(
        &self,
        phone: &str,
        latest_seen: Option<DateTime<Utc>>,
    ) -> Result<i64, StoreError> {
        let now = (self.clock)().timestamp_millis();
        let marker = latest_seen
            .map(|seen| seen.timestamp_millis().max(now))
            .unwrap_or(now);

        read_markers::set_last_read(&self.store, phone, marker)?;
        tracing::debug!(phone, marker, "conversation marked read");
        Ok(marker)
    }
}

pub fn is_unread_with(conversation: &Conversation, last_read: Option<i64>) -> bool {
    conversation.is_incoming()
        && conversation.last_message_time.timestamp_millis() > last_read.unwrap_or(0)
}
