use serde::{Deserialize, Serialize};

pub mod auth;
pub mod cart;
pub mod contact;
pub mod conversation;
pub mod fb_comment;
pub mod improvement;
pub mod message;
pub mod metrics;
pub mod order;
pub mod simulation;
pub mod timestamp;

pub use auth::{LoginRequest, LoginResponse, VerifyResponse};
pub use cart::{
    AbandonedCart, AbandonedCartsResponse, CartItem, CartRecoveryStats, RecoverCartsRequest,
    RecoverCartsResponse, RecoveryLog, RecoveryLogsResponse, RecoveryResponse,
    RecoveryResponsesResponse,
};
pub use contact::{ContactInfo, OrderSummary};
pub use conversation::{Conversation, ConversationsResponse, Direction};
pub use fb_comment::{FbComment, FbCommentsResponse};
pub use improvement::{
    AnalyzeResponse, ImprovementStats, Mutation, MutationActionResponse, MutationStatus,
    MutationsResponse, Suggestion, SuggestionsResponse,
};
pub use message::{
    ConversationMessagesResponse, Message, SendManualMessageRequest, SendManualMessageResponse,
};
pub use metrics::{BotMetrics, HealthStatus};
pub use order::{OrderDetails, TrackingEvent, TrackingInfo};
pub use simulation::{
    SimulationScenario, SimulationScenariosResponse, SimulationSession, SimulationStatus,
    SimulationTurn, StartSimulationRequest,
};

/// Error body returned by the backend on non-2xx responses
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(alias = "detail", alias = "message")]
    pub error: String,
}
