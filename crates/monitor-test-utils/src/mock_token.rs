//! Static media token source.

use async_trait::async_trait;
use common::media_token::{TokenError, TokenSource};
use common::secret::SecretString;
use common::types::{ParticipantIdentity, RoomId};
use std::sync::Mutex;
use std::time::Duration;

/// Token source returning a fixed token, or rejecting every request.
#[derive(Debug)]
pub struct StaticTokenSource {
    token: Option<String>,
    delay: Option<Duration>,
    requests: Mutex<Vec<(RoomId, ParticipantIdentity)>>,
}

impl StaticTokenSource {
    /// Issue `token` for every request.
    #[must_use]
    pub fn new(token: &str) -> Self {
        Self {
            token: Some(token.to_string()),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Reject every request.
    #[must_use]
    pub fn rejecting() -> Self {
        Self {
            token: None,
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Take `delay` before answering.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Requests seen so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<(RoomId, ParticipantIdentity)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn fetch(
        &self,
        room: &RoomId,
        participant: &ParticipantIdentity,
    ) -> Result<SecretString, TokenError> {
        self.requests
            .lock()
            .unwrap()
            .push((room.clone(), participant.clone()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.token {
            Some(token) => Ok(SecretString::from(token.clone())),
            None => Err(TokenError::Rejected("Status 403 Forbidden".to_string())),
        }
    }
}
