use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Bot counters from `GET /metrics`. The backend adds counters over time, so
/// anything not named here lands in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BotMetrics {
    #[serde(default)]
    pub uptime_seconds: Option<u64>,
    #[serde(default)]
    pub messages_received: Option<u64>,
    #[serde(default)]
    pub messages_sent: Option<u64>,
    #[serde(default)]
    pub active_conversations: Option<u64>,
    #[serde(default)]
    pub orders_today: Option<u64>,
    #[serde(default)]
    pub errors: Option<u64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub checks: BTreeMap<String, serde_json::Value>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self.status.to_ascii_lowercase().as_str(), "ok" | "healthy" | "up")
    }
}
