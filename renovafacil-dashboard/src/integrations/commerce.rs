//! Cart recovery, order lookup, bot status and comment moderation endpoints

use shared_types::{
    AbandonedCart, AbandonedCartsResponse, BotMetrics, CartRecoveryStats, FbComment,
    FbCommentsResponse, HealthStatus, OrderDetails, RecoverCartsRequest, RecoverCartsResponse,
    RecoveryLog, RecoveryLogsResponse, RecoveryResponse, RecoveryResponsesResponse, TrackingInfo,
};

use super::BackendClient;
use crate::error::ApiError;

impl BackendClient {
    pub async fn abandoned_carts(&self) -> Result<Vec<AbandonedCart>, ApiError> {
        let response: AbandonedCartsResponse = self.get_json(&["api", "abandoned-carts"], &[]).await?;
        Ok(response.carts)
    }

    pub async fn recover_cart(&self, cart_id: i64, dry_run: bool) -> Result<RecoverCartsResponse, ApiError> {
        let id = cart_id.to_string();
        let request = RecoverCartsRequest {
            dry_run,
            min_hours: None,
        };
        self.post_json(&["api", "abandoned-carts", &id, "recover"], &request)
            .await
    }

    /// Bulk recovery over every eligible cart
    pub async fn recover_carts(
        &self,
        request: &RecoverCartsRequest,
    ) -> Result<RecoverCartsResponse, ApiError> {
        self.post_json(&["recover-carts"], request).await
    }

    pub async fn recovery_logs(&self) -> Result<Vec<RecoveryLog>, ApiError> {
        let response: RecoveryLogsResponse = self.get_json(&["api", "recovery-logs"], &[]).await?;
        Ok(response.logs)
    }

    pub async fn recovery_responses(&self) -> Result<Vec<RecoveryResponse>, ApiError> {
        let response: RecoveryResponsesResponse =
            self.get_json(&["api", "recovery-responses"], &[]).await?;
        Ok(response.responses)
    }

    pub async fn cart_recovery_stats(&self) -> Result<CartRecoveryStats, ApiError> {
        self.get_json(&["api", "cart-recovery-stats"], &[]).await
    }

    pub async fn order(&self, number: &str) -> Result<OrderDetails, ApiError> {
        self.get_json(&["order", number], &[]).await
    }

    pub async fn track(&self, number: &str) -> Result<TrackingInfo, ApiError> {
        self.get_json(&["track", number], &[]).await
    }

    pub async fn metrics(&self) -> Result<BotMetrics, ApiError> {
        self.get_json(&["metrics"], &[]).await
    }

    pub async fn health(&self) -> Result<HealthStatus, ApiError> {
        self.get_public(&["health"]).await
    }

    pub async fn fb_comments(&self) -> Result<Vec<FbComment>, ApiError> {
        let response: FbCommentsResponse = self.get_json(&["api", "fb-comments"], &[]).await?;
        Ok(response.comments)
    }
}
