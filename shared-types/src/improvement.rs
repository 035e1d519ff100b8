use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImprovementStats {
    #[serde(default)]
    pub conversations_analyzed: u64,
    #[serde(default)]
    pub suggestions_pending: u64,
    #[serde(default)]
    pub mutations_active: u64,
    #[serde(default)]
    pub mutations_rejected: u64,
    #[serde(default, with = "crate::timestamp::option")]
    pub last_analysis: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: i64,
    #[serde(default)]
    pub category: Option<String>,
    pub description: String,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default, with = "crate::timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionsResponse {
    pub suggestions: Vec<Suggestion>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationStatus {
    Pending,
    Approved,
    Active,
    Rejected,
    Inactive,
    #[serde(other)]
    Unknown,
}

/// A prompt or behaviour change proposed by the self-improvement engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mutation {
    pub id: i64,
    pub description: String,
    pub status: MutationStatus,
    #[serde(default)]
    pub suggestion_id: Option<i64>,
    #[serde(default, with = "crate::timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationsResponse {
    pub mutations: Vec<Mutation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub suggestions_created: u32,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationActionResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}
