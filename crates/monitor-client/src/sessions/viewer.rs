//! `ViewerSession` - full viewer of a room.
//!
//! Requires a signed-in user; the participant name is derived from the
//! user's e-mail. The room membership itself lives in a
//! [`ViewerRoomActor`]; this type owns the media session underneath it.

use super::SessionContext;
use crate::actors::viewer_room::{ViewerRoomActor, ViewerRoomHandle, ViewerRoomState};
use crate::errors::SessionError;
use crate::observability::metrics;

use common::identity::{AuthenticatedUser, IdentityHandle};
use common::media::{MediaConnectOptions, MediaSession};
use common::types::{CameraName, ParticipantIdentity, RoomId};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

/// Name used when the signed-in user has no e-mail.
const FALLBACK_VIEWER_NAME: &str = "viewer";

/// An open full viewer.
///
/// Call [`ViewerSession::close`] to leave the room; dropping the session
/// only detaches the room actor.
pub struct ViewerSession {
    room: RoomId,
    identity: ParticipantIdentity,
    session: Arc<dyn MediaSession>,
    room_handle: ViewerRoomHandle,
    room_task: JoinHandle<()>,
}

impl ViewerSession {
    /// Open a full viewer of `room`, showing `camera` if given.
    ///
    /// # Errors
    ///
    /// - `SessionError::Unauthenticated` - no signed-in user
    /// - `SessionError::Token` / `SessionError::Media` - the view cannot open
    /// - `SessionError::Cancelled` - torn down while opening
    #[instrument(skip_all, name = "monitor.session.viewer", fields(room = %room))]
    pub async fn open(
        context: &SessionContext,
        identity: &IdentityHandle,
        room: RoomId,
        camera: Option<CameraName>,
        cancel_token: CancellationToken,
    ) -> Result<Self, SessionError> {
        let result = Self::connect(context, identity, room, camera, cancel_token).await;
        if let Err(e) = &result {
            if !matches!(e, SessionError::Cancelled) {
                metrics::record_session_failure("viewer");
            }
        }
        result
    }

    async fn connect(
        context: &SessionContext,
        identity: &IdentityHandle,
        room: RoomId,
        camera: Option<CameraName>,
        cancel_token: CancellationToken,
    ) -> Result<Self, SessionError> {
        let user = identity.current().ok_or(SessionError::Unauthenticated)?;
        let participant = viewer_identity(&user);

        let token = context
            .fetch_token(&room, &participant, &cancel_token)
            .await?;
        let options = MediaConnectOptions::viewer(
            context.media_url.clone(),
            room.clone(),
            participant.clone(),
            token,
        );
        let session = context.connect(options, &cancel_token).await?;

        let (room_handle, room_task) =
            ViewerRoomActor::spawn(session.clone(), camera, context.timing, cancel_token);

        info!(
            target: "monitor.session.viewer",
            room = %room,
            participant = %participant,
            "Viewer opened"
        );

        Ok(Self {
            room,
            identity: participant,
            session,
            room_handle,
            room_task,
        })
    }

    #[must_use]
    pub fn room(&self) -> &RoomId {
        &self.room
    }

    /// Participant identity this viewer joined under.
    #[must_use]
    pub fn identity(&self) -> &ParticipantIdentity {
        &self.identity
    }

    #[must_use]
    pub fn state(&self) -> ViewerRoomState {
        self.room_handle.state()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ViewerRoomState> {
        self.room_handle.subscribe()
    }

    /// Room actor handle for selection and push-to-talk.
    #[must_use]
    pub fn room_handle(&self) -> &ViewerRoomHandle {
        &self.room_handle
    }

    /// Leave the room: stop the room actor and disconnect the media session.
    pub async fn close(self) {
        self.room_handle.cancel();
        // Every presence actor is detached once the room actor returns.
        let _ = self.room_task.await;
        self.session.disconnect().await;

        info!(
            target: "monitor.session.viewer",
            room = %self.room,
            "Viewer closed"
        );
    }
}

/// `viewer-<local part of the e-mail>`.
fn viewer_identity(user: &AuthenticatedUser) -> ParticipantIdentity {
    let name = user
        .email
        .as_deref()
        .and_then(|email| email.split('@').next())
        .filter(|local| !local.is_empty())
        .unwrap_or(FALLBACK_VIEWER_NAME);
    ParticipantIdentity::viewer(name)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::PresenceTiming;
    use common::identity::IdentityPublisher;
    use common::media::PixelDensity;
    use common::secret::SecretString;
    use monitor_test_utils::{
        camera_participant, test_identity, test_room, MockMediaConnector, MockMediaSession,
        StaticTokenSource,
    };
    use std::time::Duration;

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    fn context(tokens: Arc<StaticTokenSource>, media: Arc<MockMediaConnector>) -> SessionContext {
        SessionContext::new(tokens, media, "wss://media.example.com", PresenceTiming::default())
    }

    #[test]
    fn test_viewer_identity_from_email() {
        let user = AuthenticatedUser::new("u1", SecretString::from("t")).with_email("ana@example.com");
        assert_eq!(viewer_identity(&user), ParticipantIdentity::viewer("ana"));

        let user = AuthenticatedUser::new("u2", SecretString::from("t"));
        assert_eq!(viewer_identity(&user), ParticipantIdentity::viewer("viewer"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_requires_signed_in_user() {
        let (_publisher, identity) = IdentityPublisher::new();
        let tokens = Arc::new(StaticTokenSource::new("tok"));
        let media = Arc::new(MockMediaConnector::new());

        let err = ViewerSession::open(
            &context(tokens.clone(), media.clone()),
            &identity,
            test_room(),
            None,
            CancellationToken::new(),
        )
        .await
        .err()
        .unwrap();

        assert!(matches!(err, SessionError::Unauthenticated));
        assert!(tokens.requests().is_empty());
        assert_eq!(media.connect_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_lists_camera_and_close_disconnects() {
        let session = Arc::new(MockMediaSession::new());
        session.add_participant(camera_participant("Luna"));
        let tokens = Arc::new(StaticTokenSource::new("tok"));
        let media = Arc::new(MockMediaConnector::new().with_session(session.clone()));

        let viewer = ViewerSession::open(
            &context(tokens.clone(), media.clone()),
            &test_identity(),
            test_room(),
            Some(CameraName::new("Luna")),
            CancellationToken::new(),
        )
        .await
        .unwrap();
        settle().await;

        assert_eq!(viewer.identity(), &ParticipantIdentity::viewer("parent"));
        assert_eq!(
            tokens.requests(),
            vec![(test_room(), ParticipantIdentity::viewer("parent"))]
        );

        let options = media.connect_options();
        assert!(options[0].publish_audio);
        assert_eq!(options[0].publish_video, None);
        assert_eq!(options[0].pixel_density, PixelDensity::Screen);

        let state = viewer.state();
        assert_eq!(state.cameras, vec![CameraName::new("Luna")]);
        assert_eq!(state.selected, Some(CameraName::new("Luna")));

        viewer.close().await;
        assert!(session.is_disconnected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_open_completes() {
        let tokens = Arc::new(StaticTokenSource::new("tok").with_delay(Duration::from_secs(1)));
        let media = Arc::new(MockMediaConnector::new());
        let cancel = CancellationToken::new();

        let ctx = context(tokens, media.clone());
        let identity = test_identity();
        let opening = ViewerSession::open(&ctx, &identity, test_room(), None, cancel.clone());
        let canceller = async {
            settle().await;
            cancel.cancel();
        };
        let (result, ()) = tokio::join!(opening, canceller);

        assert!(matches!(result.err().unwrap(), SessionError::Cancelled));
        assert_eq!(media.connect_count(), 0);
    }
}
