use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conversation::Direction;

/// A single WhatsApp message. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    #[serde(with = "crate::timestamp")]
    pub timestamp: DateTime<Utc>,
    pub phone: String,
    pub direction: Direction,
    #[serde(default)]
    pub message: String,
    #[serde(default = "default_message_type")]
    pub message_type: String,
    #[serde(default)]
    pub contact_name: Option<String>,
}

fn default_message_type() -> String {
    "text".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessagesResponse {
    #[serde(default)]
    pub phone: Option<String>,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendManualMessageRequest {
    pub phone: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendManualMessageResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}
