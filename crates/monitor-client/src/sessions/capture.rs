//! `CaptureSession` - the camera side of a room.
//!
//! Publishes microphone and camera under `camera-<name>`, listens to viewer
//! push-to-talk through a [`CaptureRoomActor`] and follows the capture
//! constraints produced by the command relay: whenever the session key
//! changes (rotate) the media session is torn down and reopened with the new
//! facing mode. The access token is fetched once and reused across
//! reconnects.

use super::SessionContext;
use crate::actors::camera_relay::CaptureConfig;
use crate::actors::capture_room::{CaptureRoomActor, CaptureRoomState};
use crate::errors::SessionError;
use crate::observability::metrics;

use common::media::{FacingMode, MediaConnectOptions, MediaError};
use common::secret::SecretString;
use common::types::{CameraName, ParticipantIdentity, RoomId};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, instrument, warn};

/// State of a capture view.
#[derive(Debug, Clone)]
pub enum CaptureState {
    FetchingToken,
    Connecting { session_key: u64 },
    Live {
        session_key: u64,
        facing_mode: FacingMode,
        room: CaptureRoomState,
    },
    /// Terminal.
    Failed(SessionError),
}

/// Handle to a running capture view. Dropping it tears the view down.
pub struct CaptureSessionHandle {
    state: watch::Receiver<CaptureState>,
    cancel_token: CancellationToken,
    _detach_on_drop: DropGuard,
}

impl CaptureSessionHandle {
    #[must_use]
    pub fn state(&self) -> CaptureState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CaptureState> {
        self.state.clone()
    }

    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }
}

enum Outcome {
    Stop,
    Reconnect(CaptureConfig),
    Failed,
}

pub struct CaptureSession {
    context: SessionContext,
    room: RoomId,
    camera: CameraName,
    capture: watch::Receiver<CaptureConfig>,
    state: watch::Sender<CaptureState>,
    cancel_token: CancellationToken,
}

impl CaptureSession {
    /// Start capturing as `camera` in `room`, following `capture`.
    pub fn open(
        context: SessionContext,
        room: RoomId,
        camera: CameraName,
        capture: watch::Receiver<CaptureConfig>,
        cancel_token: CancellationToken,
    ) -> (CaptureSessionHandle, JoinHandle<()>) {
        let (state_tx, state_rx) = watch::channel(CaptureState::FetchingToken);

        let session = Self {
            context,
            room,
            camera,
            capture,
            state: state_tx,
            cancel_token: cancel_token.clone(),
        };
        let task = tokio::spawn(session.run());

        let handle = CaptureSessionHandle {
            state: state_rx,
            _detach_on_drop: cancel_token.clone().drop_guard(),
            cancel_token,
        };
        (handle, task)
    }

    #[instrument(skip_all, name = "monitor.session.capture", fields(room = %self.room, camera = %self.camera))]
    async fn run(mut self) {
        match self.capture_loop().await {
            Ok(()) | Err(SessionError::Cancelled) => {}
            Err(e) => {
                metrics::record_session_failure("capture");
                warn!(
                    target: "monitor.session.capture",
                    camera = %self.camera,
                    error = %e,
                    "Capture failed"
                );
                self.state.send_replace(CaptureState::Failed(e));
            }
        }
        info!(target: "monitor.session.capture", camera = %self.camera, "Capture stopped");
    }

    async fn capture_loop(&mut self) -> Result<(), SessionError> {
        let identity = ParticipantIdentity::camera(self.camera.as_str());
        let token = self
            .context
            .fetch_token(&self.room, &identity, &self.cancel_token)
            .await?;

        let mut config = *self.capture.borrow_and_update();
        loop {
            match self.run_once(&identity, &token, config).await? {
                Outcome::Stop => return Ok(()),
                Outcome::Reconnect(next) => {
                    debug!(
                        target: "monitor.session.capture",
                        camera = %self.camera,
                        session_key = next.session_key,
                        facing_mode = next.facing_mode.as_str(),
                        "Reconnecting capture"
                    );
                    config = next;
                }
                Outcome::Failed => return Err(SessionError::Media(MediaError::Closed)),
            }
        }
    }

    /// One media session lifetime.
    async fn run_once(
        &mut self,
        identity: &ParticipantIdentity,
        token: &SecretString,
        config: CaptureConfig,
    ) -> Result<Outcome, SessionError> {
        self.state.send_replace(CaptureState::Connecting {
            session_key: config.session_key,
        });
        let options = MediaConnectOptions::capture(
            self.context.media_url.clone(),
            self.room.clone(),
            identity.clone(),
            token.clone(),
            config.facing_mode,
        );
        let session = self.context.connect(options, &self.cancel_token).await?;

        let (room, _room_task) =
            CaptureRoomActor::spawn(session.clone(), self.cancel_token.child_token());
        let mut room_state = room.subscribe();
        self.publish_live(config, room_state.borrow_and_update().clone());

        let mut capture_open = true;
        let outcome = loop {
            tokio::select! {
                biased;

                () = self.cancel_token.cancelled() => break Outcome::Stop,

                changed = self.capture.changed(), if capture_open => {
                    if changed.is_err() {
                        capture_open = false;
                        continue;
                    }
                    let next = *self.capture.borrow_and_update();
                    if next.session_key != config.session_key {
                        break Outcome::Reconnect(next);
                    }
                }

                changed = room_state.changed() => {
                    let current = room_state.borrow_and_update().clone();
                    if changed.is_err() || current.session_failed {
                        break Outcome::Failed;
                    }
                    self.publish_live(config, current);
                }
            }
        };

        drop(room);
        session.disconnect().await;
        Ok(outcome)
    }

    fn publish_live(&self, config: CaptureConfig, room: CaptureRoomState) {
        self.state.send_replace(CaptureState::Live {
            session_key: config.session_key,
            facing_mode: config.facing_mode,
            room,
        });
    }
}
