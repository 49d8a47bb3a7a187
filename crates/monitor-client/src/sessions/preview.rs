//! `PreviewSession` - thumbnail preview of one camera.
//!
//! Opens its own media session under a throwaway `thumbnail-viewer-...`
//! identity, tracks the camera with the preview policy (video only, never
//! audio) and ends on the first confirmed offline.

use super::SessionContext;
use crate::actors::presence::{CameraPresenceActor, OfflineReason, PresenceChange, PresenceSignal};
use crate::errors::SessionError;
use crate::observability::metrics;
use crate::policy::SubscriptionPolicy;

use common::media::MediaConnectOptions;
use common::types::{CameraName, ParticipantIdentity, RoomId};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{info, instrument};
use uuid::Uuid;

/// State of a preview.
#[derive(Debug, Clone)]
pub enum PreviewState {
    FetchingToken,
    Connecting,
    Live,
    /// Terminal.
    Offline(OfflineReason),
    /// Terminal. The view may open a new preview to retry.
    Failed(SessionError),
}

impl PreviewState {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, PreviewState::Offline(_) | PreviewState::Failed(_))
    }
}

/// Handle to a running preview. Dropping it tears the preview down.
pub struct PreviewHandle {
    camera: CameraName,
    state: watch::Receiver<PreviewState>,
    cancel_token: CancellationToken,
    _detach_on_drop: DropGuard,
}

impl PreviewHandle {
    #[must_use]
    pub fn camera(&self) -> &CameraName {
        &self.camera
    }

    #[must_use]
    pub fn state(&self) -> PreviewState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PreviewState> {
        self.state.clone()
    }

    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }
}

pub struct PreviewSession {
    context: SessionContext,
    room: RoomId,
    camera: CameraName,
    state: watch::Sender<PreviewState>,
    observer: Option<mpsc::Sender<PresenceSignal>>,
    cancel_token: CancellationToken,
}

impl PreviewSession {
    /// Start a preview of `camera` in `room`.
    pub fn open(
        context: SessionContext,
        room: RoomId,
        camera: CameraName,
        cancel_token: CancellationToken,
    ) -> (PreviewHandle, JoinHandle<()>) {
        Self::start(context, room, camera, None, cancel_token)
    }

    /// Start a preview that also forwards every presence signal of `camera`
    /// to `observer`.
    pub fn open_observed(
        context: SessionContext,
        room: RoomId,
        camera: CameraName,
        observer: mpsc::Sender<PresenceSignal>,
        cancel_token: CancellationToken,
    ) -> (PreviewHandle, JoinHandle<()>) {
        Self::start(context, room, camera, Some(observer), cancel_token)
    }

    fn start(
        context: SessionContext,
        room: RoomId,
        camera: CameraName,
        observer: Option<mpsc::Sender<PresenceSignal>>,
        cancel_token: CancellationToken,
    ) -> (PreviewHandle, JoinHandle<()>) {
        let (state_tx, state_rx) = watch::channel(PreviewState::FetchingToken);

        let preview = Self {
            context,
            room,
            camera: camera.clone(),
            state: state_tx,
            observer,
            cancel_token: cancel_token.clone(),
        };
        let task = tokio::spawn(preview.run());

        let handle = PreviewHandle {
            camera,
            state: state_rx,
            _detach_on_drop: cancel_token.clone().drop_guard(),
            cancel_token,
        };
        (handle, task)
    }

    #[instrument(skip_all, name = "monitor.session.preview", fields(room = %self.room, camera = %self.camera))]
    async fn run(self) {
        match self.watch_camera().await {
            Ok(()) | Err(SessionError::Cancelled) => {}
            Err(e) => {
                metrics::record_session_failure("preview");
                info!(
                    target: "monitor.session.preview",
                    camera = %self.camera,
                    error = %e,
                    "Preview failed"
                );
                self.state.send_replace(PreviewState::Failed(e));
            }
        }
    }

    async fn watch_camera(&self) -> Result<(), SessionError> {
        let nonce = Uuid::new_v4().simple().to_string();
        let identity = ParticipantIdentity::preview(&self.camera, &nonce);

        let token = self
            .context
            .fetch_token(&self.room, &identity, &self.cancel_token)
            .await?;

        self.state.send_replace(PreviewState::Connecting);
        let options = MediaConnectOptions::preview(
            self.context.media_url.clone(),
            self.room.clone(),
            identity,
            token,
        );
        let session = self.context.connect(options, &self.cancel_token).await?;

        let (signals_tx, mut signals) = mpsc::channel(8);
        let (presence, _task) = CameraPresenceActor::spawn(
            self.camera.clone(),
            session.clone(),
            SubscriptionPolicy::Preview,
            self.context.timing,
            signals_tx,
            self.cancel_token.child_token(),
        );

        loop {
            tokio::select! {
                biased;

                () = self.cancel_token.cancelled() => break,

                Some(signal) = signals.recv() => {
                    if let Some(observer) = &self.observer {
                        // A gone observer does not stop the preview.
                        let _ = observer.send(signal.clone()).await;
                    }
                    match signal.change {
                        PresenceChange::Live | PresenceChange::Reconnected => {
                            self.state.send_replace(PreviewState::Live);
                        }
                        PresenceChange::Offline(reason) => {
                            self.state.send_replace(PreviewState::Offline(reason));
                            break;
                        }
                    }
                }
            }
        }

        drop(presence);
        session.disconnect().await;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::PresenceTiming;
    use common::media::{MediaError, PixelDensity};
    use common::types::ParticipantRole;
    use monitor_test_utils::{
        camera_participant, test_room, MockMediaConnector, MockMediaSession, StaticTokenSource,
    };
    use std::sync::Arc;
    use std::time::Duration;

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    fn context(tokens: StaticTokenSource, media: Arc<MockMediaConnector>) -> SessionContext {
        SessionContext::new(
            Arc::new(tokens),
            media,
            "wss://media.example.com",
            PresenceTiming::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_preview_goes_live_with_video_only() {
        let session = Arc::new(MockMediaSession::new());
        session.add_participant(camera_participant("Luna"));
        let media = Arc::new(MockMediaConnector::new().with_session(session.clone()));

        let (handle, _task) = PreviewSession::open(
            context(StaticTokenSource::new("tok"), media.clone()),
            test_room(),
            CameraName::new("Luna"),
            CancellationToken::new(),
        );
        settle().await;

        assert!(matches!(handle.state(), PreviewState::Live));

        let options = media.connect_options();
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].identity.role(), ParticipantRole::Preview);
        assert!(options[0].identity.name().starts_with("Luna-"));
        assert!(!options[0].auto_subscribe);
        assert!(!options[0].publish_audio);
        assert_eq!(options[0].pixel_density, PixelDensity::Fixed(0.3));

        let luna = session.participant(&ParticipantIdentity::camera("Luna")).unwrap();
        assert!(luna.audio_tracks().all(|t| !t.subscribed));
        assert!(luna.video_tracks().all(|t| t.subscribed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_rejection_is_terminal() {
        let media = Arc::new(MockMediaConnector::new());
        let (handle, task) = PreviewSession::open(
            context(StaticTokenSource::rejecting(), media.clone()),
            test_room(),
            CameraName::new("Luna"),
            CancellationToken::new(),
        );
        task.await.unwrap();

        assert!(matches!(
            handle.state(),
            PreviewState::Failed(SessionError::Token(_))
        ));
        assert_eq!(media.connect_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_failure_is_terminal() {
        let media = Arc::new(MockMediaConnector::failing("ice failed"));
        let (handle, task) = PreviewSession::open(
            context(StaticTokenSource::new("tok"), media),
            test_room(),
            CameraName::new("Luna"),
            CancellationToken::new(),
        );
        task.await.unwrap();

        assert!(matches!(
            handle.state(),
            PreviewState::Failed(SessionError::Media(MediaError::Connect(_)))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_ends_preview_and_disconnects() {
        let session = Arc::new(MockMediaSession::new());
        let media = Arc::new(MockMediaConnector::new().with_session(session.clone()));
        let (handle, task) = PreviewSession::open(
            context(StaticTokenSource::new("tok"), media),
            test_room(),
            CameraName::new("Max"),
            CancellationToken::new(),
        );
        settle().await;

        tokio::time::advance(Duration::from_secs(10)).await;
        task.await.unwrap();

        assert!(matches!(
            handle.state(),
            PreviewState::Offline(OfflineReason::NeverSighted)
        ));
        assert!(session.is_disconnected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_observer_receives_presence_signals() {
        let session = Arc::new(MockMediaSession::new());
        session.add_participant(camera_participant("Luna"));
        let media = Arc::new(MockMediaConnector::new().with_session(session.clone()));
        let (observer, mut observed) = mpsc::channel(8);

        let (_handle, task) = PreviewSession::open_observed(
            context(StaticTokenSource::new("tok"), media),
            test_room(),
            CameraName::new("Luna"),
            observer,
            CancellationToken::new(),
        );
        settle().await;

        session.remove_participant(&ParticipantIdentity::camera("Luna"));
        settle().await;
        tokio::time::advance(Duration::from_millis(500)).await;
        task.await.unwrap();

        let mut changes = Vec::new();
        while let Ok(signal) = observed.try_recv() {
            assert_eq!(signal.camera, CameraName::new("Luna"));
            changes.push(signal.change);
        }
        assert_eq!(
            changes,
            vec![
                PresenceChange::Live,
                PresenceChange::Offline(OfflineReason::Departed)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_while_fetching_token_discards_result() {
        let media = Arc::new(MockMediaConnector::new());
        let (handle, task) = PreviewSession::open(
            context(
                StaticTokenSource::new("tok").with_delay(Duration::from_secs(2)),
                media.clone(),
            ),
            test_room(),
            CameraName::new("Luna"),
            CancellationToken::new(),
        );
        settle().await;

        handle.cancel();
        task.await.unwrap();
        tokio::time::advance(Duration::from_secs(5)).await;
        settle().await;

        assert!(matches!(handle.state(), PreviewState::FetchingToken));
        assert_eq!(media.connect_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_connect_is_disconnected() {
        let media = Arc::new(MockMediaConnector::new().with_delay(Duration::from_secs(2)));
        let (handle, task) = PreviewSession::open(
            context(StaticTokenSource::new("tok"), media.clone()),
            test_room(),
            CameraName::new("Luna"),
            CancellationToken::new(),
        );
        settle().await;
        assert!(matches!(handle.state(), PreviewState::Connecting));

        drop(handle);
        task.await.unwrap();
        tokio::time::advance(Duration::from_secs(3)).await;
        settle().await;

        let opened = media.opened_sessions();
        assert_eq!(opened.len(), 1);
        assert!(opened[0].is_disconnected());
    }
}
