use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    pub name: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub price: Option<f64>,
}

fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbandonedCart {
    pub id: i64,
    pub phone: String,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub total: f64,
    #[serde(default, with = "crate::timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub recovered: bool,
    #[serde(default)]
    pub recovery_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbandonedCartsResponse {
    pub carts: Vec<AbandonedCart>,
}

/// Body for both single-cart and bulk recovery. With `dry_run` the backend
/// reports what it would send without sending anything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecoverCartsRequest {
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_hours: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoverCartsResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub processed: u32,
    #[serde(default)]
    pub sent: u32,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryLog {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub cart_id: Option<i64>,
    pub phone: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, with = "crate::timestamp::option")]
    pub sent_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryLogsResponse {
    pub logs: Vec<RecoveryLog>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryResponse {
    pub phone: String,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub response: String,
    #[serde(default, with = "crate::timestamp::option")]
    pub responded_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub converted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryResponsesResponse {
    pub responses: Vec<RecoveryResponse>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CartRecoveryStats {
    #[serde(default)]
    pub total_abandoned: u64,
    #[serde(default)]
    pub messages_sent: u64,
    #[serde(default)]
    pub responses: u64,
    #[serde(default)]
    pub recovered: u64,
    #[serde(default)]
    pub recovery_rate: f64,
    #[serde(default)]
    pub revenue_recovered: f64,
}
