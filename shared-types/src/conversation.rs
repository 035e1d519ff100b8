use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side sent a message. Conversations carry the direction of their latest message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Incoming => "incoming",
            Direction::Outgoing => "outgoing",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A WhatsApp thread keyed by customer phone number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub phone: String,
    #[serde(default)]
    pub phone_masked: Option<String>,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub last_message: String,
    #[serde(with = "crate::timestamp")]
    pub last_message_time: DateTime<Utc>,
    pub direction: Direction,
    #[serde(default)]
    pub message_count: u32,
}

impl Conversation {
    pub fn is_incoming(&self) -> bool {
        self.direction == Direction::Incoming
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationsResponse {
    pub conversations: Vec<Conversation>,
    #[serde(default)]
    pub total: Option<u64>,
}
