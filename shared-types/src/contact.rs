use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Order history aggregate for a phone number, shown in the inbox side panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub phone: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub orders: Vec<OrderSummary>,
    #[serde(default)]
    pub order_count: u32,
    #[serde(default)]
    pub total_spent: f64,
    #[serde(default)]
    pub last_order: Option<OrderSummary>,
}

impl ContactInfo {
    /// The contact's name when the backend knows one.
    pub fn known_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub order_number: String,
    #[serde(default, with = "crate::timestamp::option")]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub items_count: Option<u32>,
}
