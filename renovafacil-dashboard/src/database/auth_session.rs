use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::LocalStore;
use crate::error::StoreError;

const SESSION_KEY: &str = "auth.session";

/// Operator session persisted between runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub token: String,
    pub username: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl StoredSession {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

pub fn save_session(store: &LocalStore, session: &StoredSession) -> Result<(), StoreError> {
    store.set(SESSION_KEY, session)
}

/// Returns the stored session if it has not expired. Expired sessions are removed.
pub fn load_session(store: &LocalStore) -> Result<Option<StoredSession>, StoreError> {
    load_session_at(store, Utc::now())
}

pub fn load_session_at(
    store: &LocalStore,
    now: DateTime<Utc>,
) -> Result<Option<StoredSession>, StoreError> {
    let session = match store.get::<StoredSession>(SESSION_KEY) {
        Ok(session) => session,
        Err(StoreError::Json(e)) => {
            tracing::warn!("Discarding unreadable stored session: {}", e);
            store.remove(SESSION_KEY)?;
            None
        }
        Err(e) => return Err(e),
    };

    match session {
        Some(session) if session.is_expired_at(now) => {
            tracing::info!("Stored session expired at {}", session.expires_at);
            store.remove(SESSION_KEY)?;
            Ok(None)
        }
        other => Ok(other),
    }
}

pub fn clear_session(store: &LocalStore) -> Result<(), StoreError> {
    store.remove(SESSION_KEY)?;
    Ok(())
}
