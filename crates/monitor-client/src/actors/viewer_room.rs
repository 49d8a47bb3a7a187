//! `ViewerRoomActor` - room membership for a full viewer.
//!
//! The actor supervises one [`CameraPresenceActor`] per camera it has seen
//! (plus the camera the viewer asked for), all with the full viewer policy,
//! and derives the view state from them:
//!
//! - `cameras`: live cameras publishing video (a camera inside its settle
//!   delay stays listed)
//! - `selected`: the requested camera when listed, else the first; chosen
//!   once, reset when no cameras remain
//! - `speaking`: viewers whose microphone is unmuted
//! - `talking`: whether this viewer's push-to-talk is pressed
//!
//! A camera that was confirmed offline gets a fresh presence actor when it
//! joins again.

use crate::actors::presence::{
    CameraPresenceActor, CameraPresenceHandle, OfflineReason, PresenceChange, PresenceSignal,
    PresenceState,
};
use crate::config::PresenceTiming;
use crate::errors::SessionError;
use crate::policy::SubscriptionPolicy;

use common::media::{MediaEvent, MediaSession, RemoteParticipant};
use common::types::{CameraName, ParticipantIdentity, ParticipantRole, TrackKind, TrackSid};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, instrument, warn};

const REQUEST_BUFFER: usize = 32;
const SIGNAL_BUFFER: usize = 64;

/// Derived state of a full viewer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewerRoomState {
    pub cameras: Vec<CameraName>,
    pub selected: Option<CameraName>,
    pub speaking: BTreeSet<ParticipantIdentity>,
    pub talking: bool,
    /// Cameras confirmed offline, until they come back.
    pub offline: BTreeMap<CameraName, OfflineReason>,
    /// The media session failed or closed.
    pub session_failed: bool,
}

enum ViewerRequest {
    Select {
        camera: CameraName,
        respond_to: oneshot::Sender<Result<(), SessionError>>,
    },
    PushToTalk {
        pressed: bool,
        respond_to: oneshot::Sender<Result<(), SessionError>>,
    },
}

/// Handle to a `ViewerRoomActor`. Dropping it detaches the actor.
pub struct ViewerRoomHandle {
    sender: mpsc::Sender<ViewerRequest>,
    state: watch::Receiver<ViewerRoomState>,
    cancel_token: CancellationToken,
    _detach_on_drop: DropGuard,
}

impl ViewerRoomHandle {
    #[must_use]
    pub fn state(&self) -> ViewerRoomState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ViewerRoomState> {
        self.state.clone()
    }

    /// Show `camera`.
    ///
    /// # Errors
    ///
    /// `SessionError::Validation` if `camera` is not listed.
    pub async fn select_camera(&self, camera: CameraName) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.request(ViewerRequest::Select {
            camera,
            respond_to: tx,
        })
        .await?;
        rx.await
            .map_err(|e| SessionError::Internal(format!("response receive failed: {e}")))?
    }

    /// Push-to-talk pressed: unmute the microphone.
    ///
    /// A no-op while no microphone track is published.
    ///
    /// # Errors
    ///
    /// `SessionError::Media` if the mute state cannot be changed.
    pub async fn press_to_talk(&self) -> Result<(), SessionError> {
        self.push_to_talk(true).await
    }

    /// Push-to-talk released: mute the microphone.
    ///
    /// # Errors
    ///
    /// As [`ViewerRoomHandle::press_to_talk`].
    pub async fn release_to_talk(&self) -> Result<(), SessionError> {
        self.push_to_talk(false).await
    }

    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    async fn push_to_talk(&self, pressed: bool) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.request(ViewerRequest::PushToTalk {
            pressed,
            respond_to: tx,
        })
        .await?;
        rx.await
            .map_err(|e| SessionError::Internal(format!("response receive failed: {e}")))?
    }

    async fn request(&self, request: ViewerRequest) -> Result<(), SessionError> {
        self.sender
            .send(request)
            .await
            .map_err(|e| SessionError::Internal(format!("channel send failed: {e}")))
    }
}

/// The `ViewerRoomActor` implementation.
pub struct ViewerRoomActor {
    session: Arc<dyn MediaSession>,
    requested: Option<CameraName>,
    timing: PresenceTiming,
    trackers: BTreeMap<CameraName, CameraPresenceHandle>,
    signals_tx: mpsc::Sender<PresenceSignal>,
    signals: mpsc::Receiver<PresenceSignal>,
    requests: mpsc::Receiver<ViewerRequest>,
    local_audio: Option<TrackSid>,
    state: ViewerRoomState,
    state_tx: watch::Sender<ViewerRoomState>,
    cancel_token: CancellationToken,
}

impl ViewerRoomActor {
    /// Spawn the actor on `session`. `requested` is the camera the viewer
    /// opened; it is tracked even before it appears.
    pub fn spawn(
        session: Arc<dyn MediaSession>,
        requested: Option<CameraName>,
        timing: PresenceTiming,
        cancel_token: CancellationToken,
    ) -> (ViewerRoomHandle, JoinHandle<()>) {
        let (sender, requests) = mpsc::channel(REQUEST_BUFFER);
        let (signals_tx, signals) = mpsc::channel(SIGNAL_BUFFER);
        let (state_tx, state_rx) = watch::channel(ViewerRoomState::default());

        let actor = Self {
            session,
            requested,
            timing,
            trackers: BTreeMap::new(),
            signals_tx,
            signals,
            requests,
            local_audio: None,
            state: ViewerRoomState::default(),
            state_tx,
            cancel_token: cancel_token.clone(),
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = ViewerRoomHandle {
            sender,
            state: state_rx,
            _detach_on_drop: cancel_token.clone().drop_guard(),
            cancel_token,
        };

        (handle, task_handle)
    }

    #[instrument(skip_all, name = "monitor.actor.viewer_room")]
    async fn run(mut self) {
        info!(
            target: "monitor.actor.viewer_room",
            requested = ?self.requested.as_ref().map(CameraName::as_str),
            "Viewer room started"
        );

        let mut events = self.session.events();
        self.snapshot().await;

        loop {
            tokio::select! {
                biased;

                () = self.cancel_token.cancelled() => break,

                Some(request) = self.requests.recv() => {
                    self.handle_request(request).await;
                }

                Some(signal) = self.signals.recv() => {
                    self.handle_signal(signal);
                }

                event = events.recv() => {
                    match event {
                        Ok(event) => self.handle_event(event).await,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(
                                target: "monitor.actor.viewer_room",
                                skipped,
                                "Media events lagged, resyncing"
                            );
                            self.snapshot().await;
                        }
                        Err(RecvError::Closed) => {
                            self.on_session_failed();
                            break;
                        }
                    }
                }
            }
        }

        // Detach every presence actor.
        self.trackers.clear();

        info!(target: "monitor.actor.viewer_room", "Viewer room stopped");
    }

    /// Track present cameras and seed the speaking set and local audio.
    async fn snapshot(&mut self) {
        if let Some(requested) = self.requested.clone() {
            self.track(requested);
        }

        let participants = self.session.participants();
        for participant in &participants {
            self.on_participant(participant);
        }

        if let Some(sid) = self.session.local_audio_tracks().into_iter().next() {
            self.on_local_audio(sid).await;
        }

        self.refresh();
    }

    fn on_participant(&mut self, participant: &RemoteParticipant) {
        match participant.identity.role() {
            ParticipantRole::Camera => {
                if let Some(camera) = participant.identity.camera_name() {
                    self.track(camera);
                }
            }
            ParticipantRole::Viewer => {
                if participant.has_unmuted_audio() {
                    self.state.speaking.insert(participant.identity.clone());
                } else {
                    self.state.speaking.remove(&participant.identity);
                }
            }
            ParticipantRole::Preview | ParticipantRole::Other => {}
        }
    }

    /// Start a presence actor for `camera` unless one is running.
    fn track(&mut self, camera: CameraName) {
        if self
            .trackers
            .get(&camera)
            .is_some_and(|handle| !handle.state().is_offline())
        {
            return;
        }

        debug!(target: "monitor.actor.viewer_room", camera = %camera, "Tracking camera");
        let (handle, _task) = CameraPresenceActor::spawn(
            camera.clone(),
            self.session.clone(),
            SubscriptionPolicy::FullViewer,
            self.timing,
            self.signals_tx.clone(),
            self.cancel_token.child_token(),
        );
        self.trackers.insert(camera, handle);
    }

    async fn handle_event(&mut self, event: MediaEvent) {
        match event {
            MediaEvent::ParticipantConnected(participant) => {
                if self.state.session_failed {
                    return;
                }
                self.on_participant(&participant);
            }
            MediaEvent::ParticipantDisconnected(identity) => {
                if identity.is_viewer() {
                    self.state.speaking.remove(&identity);
                }
            }
            MediaEvent::TrackMuted { participant, sid } => {
                if self.is_viewer_audio(&participant, &sid) {
                    self.state.speaking.remove(&participant);
                }
            }
            MediaEvent::TrackUnmuted { participant, sid } => {
                if self.is_viewer_audio(&participant, &sid) {
                    self.state.speaking.insert(participant);
                }
            }
            MediaEvent::TrackPublished { .. } | MediaEvent::TrackUnpublished { .. } => {}
            MediaEvent::LocalAudioPublished(sid) => self.on_local_audio(sid).await,
            MediaEvent::ConnectionError(_) | MediaEvent::Disconnected => {
                self.on_session_failed();
            }
        }
        self.refresh();
    }

    fn is_viewer_audio(&self, participant: &ParticipantIdentity, sid: &TrackSid) -> bool {
        participant.is_viewer()
            && self
                .session
                .participant(participant)
                .and_then(|p| p.track(sid).map(|t| t.kind))
                == Some(TrackKind::Audio)
    }

    fn handle_signal(&mut self, signal: PresenceSignal) {
        match signal.change {
            PresenceChange::Live | PresenceChange::Reconnected => {
                self.state.offline.remove(&signal.camera);
            }
            PresenceChange::Offline(reason) => {
                info!(
                    target: "monitor.actor.viewer_room",
                    camera = %signal.camera,
                    reason = reason.as_str(),
                    "Camera offline"
                );
                self.state.offline.insert(signal.camera, reason);
            }
        }
        self.refresh();
    }

    fn on_session_failed(&mut self) {
        if !self.state.session_failed {
            warn!(target: "monitor.actor.viewer_room", "Media session failed");
            self.state.session_failed = true;
            self.refresh();
        }
    }

    async fn on_local_audio(&mut self, sid: TrackSid) {
        if self.local_audio.is_some() {
            return;
        }
        // Push-to-talk: the microphone starts muted.
        if let Err(e) = self.session.set_local_audio_muted(&sid, true).await {
            warn!(
                target: "monitor.actor.viewer_room",
                error = %e,
                "Could not mute microphone"
            );
        }
        self.local_audio = Some(sid);
        self.state.talking = false;
    }

    async fn handle_request(&mut self, request: ViewerRequest) {
        match request {
            ViewerRequest::Select { camera, respond_to } => {
                let result = if self.state.cameras.contains(&camera) {
                    self.state.selected = Some(camera);
                    self.publish();
                    Ok(())
                } else {
                    Err(SessionError::Validation(format!("Camera {camera} is not available")))
                };
                let _ = respond_to.send(result);
            }
            ViewerRequest::PushToTalk {
                pressed,
                respond_to,
            } => {
                let result = self.push_to_talk(pressed).await;
                let _ = respond_to.send(result);
            }
        }
    }

    async fn push_to_talk(&mut self, pressed: bool) -> Result<(), SessionError> {
        let Some(sid) = self.local_audio.clone() else {
            debug!(target: "monitor.actor.viewer_room", "No microphone, push-to-talk ignored");
            return Ok(());
        };
        self.session.set_local_audio_muted(&sid, !pressed).await?;
        self.state.talking = pressed;
        self.publish();
        Ok(())
    }

    /// Recompute the camera list and selection, then publish.
    fn refresh(&mut self) {
        let session = &self.session;
        let cameras: Vec<CameraName> = self
            .trackers
            .iter()
            .filter(|(_, handle)| handle.state() == PresenceState::Live)
            .filter(|(camera, _)| {
                session
                    .participant(&camera.participant_identity())
                    .map_or(true, |p| p.video_tracks().next().is_some())
            })
            .map(|(camera, _)| camera.clone())
            .collect();

        if cameras.is_empty() {
            self.state.selected = None;
        } else if self.state.selected.is_none() {
            self.state.selected = self
                .requested
                .clone()
                .filter(|requested| cameras.contains(requested))
                .or_else(|| cameras.first().cloned());
        }
        self.state.cameras = cameras;
        self.publish();
    }

    fn publish(&self) {
        self.state_tx.send_if_modified(|current| {
            if *current == self.state {
                false
            } else {
                current.clone_from(&self.state);
                true
            }
        });
    }
}
