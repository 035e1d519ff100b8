use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A Facebook comment as seen by the moderation bot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FbComment {
    pub id: String,
    #[serde(default)]
    pub post_id: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default, with = "crate::timestamp::option")]
    pub created_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub reply: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FbCommentsResponse {
    pub comments: Vec<FbComment>,
}
