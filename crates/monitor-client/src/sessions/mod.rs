//! Session views: preview, full viewer and capture.
//!
//! Each view fetches a media access token, opens its own media session and
//! composes the room membership actors on top of it. Both asynchronous steps
//! are raced against the view's cancellation token; a view torn down while
//! they are in flight never sees their results.

pub mod capture;
pub mod preview;
pub mod viewer;

pub use capture::{CaptureSession, CaptureSessionHandle, CaptureState};
pub use preview::{PreviewHandle, PreviewSession, PreviewState};
pub use viewer::ViewerSession;

use crate::config::PresenceTiming;
use crate::errors::SessionError;

use common::media::{MediaConnectOptions, MediaConnector, MediaSession};
use common::media_token::TokenSource;
use common::secret::SecretString;
use common::types::{ParticipantIdentity, RoomId};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Everything a view needs to open a media session.
#[derive(Clone)]
pub struct SessionContext {
    pub tokens: Arc<dyn TokenSource>,
    pub media: Arc<dyn MediaConnector>,
    /// Media server URL.
    pub media_url: String,
    pub timing: PresenceTiming,
}

impl SessionContext {
    #[must_use]
    pub fn new(
        tokens: Arc<dyn TokenSource>,
        media: Arc<dyn MediaConnector>,
        media_url: impl Into<String>,
        timing: PresenceTiming,
    ) -> Self {
        Self {
            tokens,
            media,
            media_url: media_url.into(),
            timing,
        }
    }

    /// Fetch an access token for `identity` in `room`.
    ///
    /// # Errors
    ///
    /// - `SessionError::Cancelled` - the view was torn down first
    /// - `SessionError::Token` - the backend did not issue a token
    pub async fn fetch_token(
        &self,
        room: &RoomId,
        identity: &ParticipantIdentity,
        cancel_token: &CancellationToken,
    ) -> Result<SecretString, SessionError> {
        tokio::select! {
            biased;
            () = cancel_token.cancelled() => Err(SessionError::Cancelled),
            result = self.tokens.fetch(room, identity) => {
                result.map_err(|e| {
                    warn!(
                        target: "monitor.session",
                        room = %room,
                        participant = %identity,
                        error = %e,
                        "Media token fetch failed"
                    );
                    SessionError::from(e)
                })
            }
        }
    }

    /// Open a media session.
    ///
    /// A connect that completes after the view was torn down is disconnected
    /// right away.
    ///
    /// # Errors
    ///
    /// - `SessionError::Cancelled` - the view was torn down first
    /// - `SessionError::Media` - the connect failed
    pub async fn connect(
        &self,
        options: MediaConnectOptions,
        cancel_token: &CancellationToken,
    ) -> Result<Arc<dyn MediaSession>, SessionError> {
        let media = self.media.clone();
        let identity = options.identity.clone();
        let mut connecting = tokio::spawn(async move { media.connect(options).await });

        tokio::select! {
            biased;
            () = cancel_token.cancelled() => {
                tokio::spawn(async move {
                    if let Ok(Ok(late)) = connecting.await {
                        debug!(
                            target: "monitor.session",
                            participant = %identity,
                            "Discarding media session opened after teardown"
                        );
                        late.disconnect().await;
                    }
                });
                Err(SessionError::Cancelled)
            }
            joined = &mut connecting => {
                let session = joined
                    .map_err(|e| SessionError::Internal(format!("connect task failed: {e}")))??;
                debug!(
                    target: "monitor.session",
                    participant = %identity,
                    "Media session open"
                );
                Ok(session)
            }
        }
    }
}
