//! HTTP client for the Renovafacil bot backend.
//!
//! Every authenticated call reads the bearer token from the [`LocalStore`]
//! at call time, so a login or logout in another process is picked up on the
//! next request. A 401/403 answer clears the stored session.

use chrono::{DateTime, Duration, Utc};
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_types::{
    ContactInfo, Conversation, ConversationMessagesResponse, ConversationsResponse, ErrorResponse,
    LoginRequest, LoginResponse, Message, SendManualMessageRequest, SendManualMessageResponse,
    VerifyResponse,
};

use crate::config::BackendConfig;
use crate::database::auth_session::{self, StoredSession};
use crate::database::LocalStore;
use crate::error::ApiError;

/// Session lifetime assumed when the login response carries no expiry
const DEFAULT_SESSION_HOURS: i64 = 24;

/// `None` when `secs` does not fit a representable timestamp
fn expiry_after(now: DateTime<Utc>, secs: i64) -> Option<DateTime<Utc>> {
    let expiry = Duration::try_seconds(secs).and_then(|d| now.checked_add_signed(d));
    if expiry.is_none() {
        tracing::warn!(expires_in = secs, "Ignoring out-of-range session expiry");
    }
    expiry
}

#[derive(Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: Url,
    store: LocalStore,
}

impl BackendClient {
    pub fn new(config: &BackendConfig, store: LocalStore) -> Result<Self, ApiError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;

        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(config.base_url.clone()));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            base_url,
            store,
        })
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub(crate) fn url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn bearer_token(&self) -> Result<String, ApiError> {
        auth_session::load_session(&self.store)?
            .map(|session| session.token)
            .ok_or(ApiError::Unauthorized)
    }

    async fn send_authorized(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let token = self.bearer_token()?;
        let response = request.bearer_auth(token).send().await?;

        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            tracing::info!("Backend rejected session token, clearing stored session");
            auth_session::clear_session(&self.store)?;
            return Err(ApiError::Unauthorized);
        }

        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(endpoint: &str, response: Response) -> Result<T, ApiError> {
        let status = response.status();
        let body = response.text().await?;
        tracing::debug!(endpoint, status = %status, bytes = body.len(), "backend response");

        if !status.is_success() {
            let body = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            return Err(ApiError::Status { status, body });
        }

        serde_json::from_str(&body).map_err(|source| ApiError::Decode {
            endpoint: endpoint.to_string(),
            source,
        })
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let url = self.url(segments)?;
        let endpoint = url.path().to_string();
        let response = self
            .send_authorized(self.client.get(url).query(query))
            .await?;
        Self::decode(&endpoint, response).await
    }

    pub(crate) async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.url(segments)?;
        let endpoint = url.path().to_string();
        let response = self
            .send_authorized(self.client.post(url).json(body))
            .await?;
        Self::decode(&endpoint, response).await
    }

    /// Unauthenticated GET, for endpoints reachable without a session
    pub(crate) async fn get_public<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ApiError> {
        let url = self.url(segments)?;
        let endpoint = url.path().to_string();
        let response = self.client.get(url).send().await?;
        Self::decode(&endpoint, response).await
    }

    // Authentication

    pub async fn login(&self, username: &str, password: &str) -> Result<StoredSession, ApiError> {
        let url = self.url(&["api", "auth", "login"])?;
        let request = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };

        let response = self.client.post(url).json(&request).send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        let login: LoginResponse = Self::decode("/api/auth/login", response).await?;

        let now = Utc::now();
        let expires_at = login
            .expires_at
            .or_else(|| login.expires_in.and_then(|secs| expiry_after(now, secs)))
            .unwrap_or_else(|| now + Duration::hours(DEFAULT_SESSION_HOURS));

        let session = StoredSession {
            token: login.token,
            username: login.username.or_else(|| Some(username.to_string())),
            expires_at,
        };
        auth_session::save_session(&self.store, &session)?;

        tracing::info!("Logged in as {}", username);
        Ok(session)
    }

    /// Tells the backend to drop the token, then forgets it locally whatever the outcome.
    pub async fn logout(&self) -> Result<(), ApiError> {
        if auth_session::load_session(&self.store)?.is_some() {
            let result: Result<serde_json::Value, ApiError> = self
                .post_json(&["api", "auth", "logout"], &serde_json::json!({}))
                .await;
            if let Err(e) = result {
                tracing::warn!("Backend logout failed: {}", e);
            }
        }

        auth_session::clear_session(&self.store)?;
        Ok(())
    }

    pub async fn verify(&self) -> Result<VerifyResponse, ApiError> {
        let verify: VerifyResponse = self.get_json(&["api", "auth", "verify"], &[]).await?;
        if !verify.valid {
            auth_session::clear_session(&self.store)?;
            return Err(ApiError::Unauthorized);
        }
        Ok(verify)
    }

    // Inbox

    pub async fn list_conversations(&self, limit: u32) -> Result<Vec<Conversation>, ApiError> {
        let response: ConversationsResponse = self
            .get_json(&["api", "conversations"], &[("limit", limit.to_string())])
            .await?;
        Ok(response.conversations)
    }

    pub async fn conversation_messages(&self, phone: &str) -> Result<Vec<Message>, ApiError> {
        let response: ConversationMessagesResponse =
            self.get_json(&["api", "conversations", phone], &[]).await?;
        Ok(response.messages)
    }

    pub async fn send_manual_message(
        &self,
        phone: &str,
        message: &str,
    ) -> Result<SendManualMessageResponse, ApiError> {
        let request = SendManualMessageRequest {
            phone: phone.to_string(),
            message: message.to_string(),
        };
        let response: SendManualMessageResponse = self
            .post_json(&["api", "send-manual-message"], &request)
            .await?;

        if !response.success {
            return Err(ApiError::Status {
                status: StatusCode::OK,
                body: response
                    .error
                    .unwrap_or_else(|| "message was not sent".to_string()),
            });
        }
        Ok(response)
    }

    pub async fn contact_info(&self, phone: &str) -> Result<ContactInfo, ApiError> {
        self.get_json(&["api", "contact-info", phone], &[]).await
    }
}
