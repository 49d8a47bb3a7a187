//! Media access token client.
//!
//! Every capture, viewer or preview view needs a media access token before it
//! can open a media session. The backend issues them from a single endpoint
//! keyed by room name and participant name:
//!
//! ```text
//! GET {api_url}/getToken?roomName=<room>&participantName=<identity>
//! -> 200 { "token": "<jwt>" }
//! ```
//!
//! Unlike a service credential there is no refresh loop: a token is fetched
//! once per view, and a failure is terminal for that view (the view's own
//! retry affordance fetches again).
//!
//! # Security
//!
//! - The token is returned as `SecretString` (never logged)
//! - Acquisition events are logged without the token value
//! - HTTP timeouts prevent hanging requests

use crate::secret::SecretString;
use crate::types::{ParticipantIdentity, RoomId};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};

// =============================================================================
// Constants
// =============================================================================

/// Default HTTP request timeout.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Default connection timeout for HTTP client.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while acquiring a media token.
#[derive(Error, Debug, Clone)]
pub enum TokenError {
    /// HTTP client error (unreachable backend, timeout).
    #[error("HTTP client error: {0}")]
    Http(String),

    /// Backend refused to issue a token.
    #[error("Token request rejected: {0}")]
    Rejected(String),

    /// Token response parsing failed.
    #[error("Invalid token response: {0}")]
    InvalidResponse(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

// =============================================================================
// Response Types
// =============================================================================

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

// =============================================================================
// Token source
// =============================================================================

/// Anything that can issue media access tokens.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch(
        &self,
        room: &RoomId,
        participant: &ParticipantIdentity,
    ) -> Result<SecretString, TokenError>;
}

#[async_trait]
impl TokenSource for MediaTokenClient {
    async fn fetch(
        &self,
        room: &RoomId,
        participant: &ParticipantIdentity,
    ) -> Result<SecretString, TokenError> {
        MediaTokenClient::fetch(self, room, participant).await
    }
}

// =============================================================================
// Client
// =============================================================================

/// Client for the media token endpoint.
#[derive(Debug, Clone)]
pub struct MediaTokenClient {
    http_client: reqwest::Client,
    api_url: String,
}

impl MediaTokenClient {
    /// Create a client against the backend at `api_url`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Configuration` if the HTTP client cannot be built.
    pub fn new(api_url: impl Into<String>, http_timeout: Duration) -> Result<Self, TokenError> {
        let http_client = reqwest::Client::builder()
            .timeout(http_timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| TokenError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Fetch a media access token for `participant` in `room`.
    ///
    /// # Errors
    ///
    /// - `TokenError::Http` - backend unreachable or returned a server error
    /// - `TokenError::Rejected` - backend refused the request (4xx)
    /// - `TokenError::InvalidResponse` - body missing or token empty
    #[instrument(skip_all, fields(room = %room, participant = %participant))]
    pub async fn fetch(
        &self,
        room: &RoomId,
        participant: &ParticipantIdentity,
    ) -> Result<SecretString, TokenError> {
        let url = format!("{}/getToken", self.api_url);
        let participant_name = participant.as_wire();

        debug!(
            target: "common.media_token",
            url = %url,
            "Requesting media token"
        );

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("roomName", room.as_str()),
                ("participantName", participant_name.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                debug!(target: "common.media_token", error = %e, "HTTP request failed");
                TokenError::Http(e.to_string())
            })?;

        let status = response.status();

        if status.is_success() {
            let body: TokenResponse = response.json().await.map_err(|e| {
                warn!(target: "common.media_token", error = %e, "Failed to parse token response");
                TokenError::InvalidResponse(e.to_string())
            })?;

            if body.token.is_empty() {
                return Err(TokenError::InvalidResponse("empty token".into()));
            }

            debug!(target: "common.media_token", "Media token acquired");
            Ok(SecretString::from(body.token))
        } else if status.is_client_error() {
            warn!(
                target: "common.media_token",
                status = %status,
                "Media token request rejected"
            );
            Err(TokenError::Rejected(format!("Status {status}")))
        } else {
            warn!(
                target: "common.media_token",
                status = %status,
                "Unexpected response from token endpoint"
            );
            Err(TokenError::Http(format!("Unexpected status: {status}")))
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
