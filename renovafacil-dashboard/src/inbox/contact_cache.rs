use shared_types::ContactInfo;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::ApiError;

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, ContactInfo>,
    in_flight: HashSet<String>,
}

/// Per-phone contact info, fetched at most once per phone for the life of
/// the cache. Failed fetches are not cached and retry on the next request.
#[derive(Clone, Default)]
pub struct ContactInfoCache {
    state: Arc<Mutex<CacheState>>,
}

impl ContactInfoCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, phone: &str) -> Option<ContactInfo> {
        let state = self.state.lock().await;
        state.entries.get(phone).cloned()
    }

    /// Known contact names keyed by phone
    pub async fn names(&self) -> HashMap<String, String> {
        let state = self.state.lock().await;
        state
            .entries
            .iter()
            .filter_map(|(phone, info)| info.known_name().map(|n| (phone.clone(), n.to_string())))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Runs `load` unless the phone is cached or already being fetched.
    /// Returns whether a new entry was stored.
    pub async fn ensure<F, Fut>(&self, phone: &str, load: F) -> Result<bool, ApiError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<ContactInfo, ApiError>>,
    {
        {
            let mut state = self.state.lock().await;
            if state.entries.contains_key(phone) || state.in_flight.contains(phone) {
                return Ok(false);
            }
            state.in_flight.insert(phone.to_string());
        }

        let result = load(phone.to_string()).await;

        let mut state = self.state.lock().await;
        state.in_flight.remove(phone);
        let info = result?;
        state.entries.insert(phone.to_string(), info);
        Ok(true)
    }
}
