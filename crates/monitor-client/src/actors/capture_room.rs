//! `CaptureRoomActor` - room membership on the camera side.
//!
//! Subscribes to viewer microphones (push-to-talk) and nothing else, for
//! publications present when the session opens and for those published
//! later.

use crate::policy::SubscriptionPolicy;

use common::media::{MediaEvent, MediaSession};
use common::types::ParticipantIdentity;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, instrument, warn};

/// What the camera currently hears.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureRoomState {
    /// Viewers whose microphone is subscribed.
    pub listening_to: BTreeSet<ParticipantIdentity>,
    pub session_failed: bool,
}

/// Handle to a `CaptureRoomActor`. Dropping it detaches the actor.
pub struct CaptureRoomHandle {
    state: watch::Receiver<CaptureRoomState>,
    cancel_token: CancellationToken,
    _detach_on_drop: DropGuard,
}

impl CaptureRoomHandle {
    #[must_use]
    pub fn state(&self) -> CaptureRoomState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CaptureRoomState> {
        self.state.clone()
    }

    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }
}

/// The `CaptureRoomActor` implementation.
pub struct CaptureRoomActor {
    session: Arc<dyn MediaSession>,
    state: watch::Sender<CaptureRoomState>,
    cancel_token: CancellationToken,
}

impl CaptureRoomActor {
    pub fn spawn(
        session: Arc<dyn MediaSession>,
        cancel_token: CancellationToken,
    ) -> (CaptureRoomHandle, JoinHandle<()>) {
        let (state_tx, state_rx) = watch::channel(CaptureRoomState::default());

        let actor = Self {
            session,
            state: state_tx,
            cancel_token: cancel_token.clone(),
        };
        let task_handle = tokio::spawn(actor.run());

        let handle = CaptureRoomHandle {
            state: state_rx,
            _detach_on_drop: cancel_token.clone().drop_guard(),
            cancel_token,
        };
        (handle, task_handle)
    }

    #[instrument(skip_all, name = "monitor.actor.capture_room")]
    async fn run(self) {
        info!(target: "monitor.actor.capture_room", "Capture room started");

        let mut events = self.session.events();
        self.resync().await;

        loop {
            tokio::select! {
                biased;

                () = self.cancel_token.cancelled() => break,

                event = events.recv() => {
                    match event {
                        Ok(event) => {
                            if !self.handle_event(event).await {
                                break;
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(
                                target: "monitor.actor.capture_room",
                                skipped,
                                "Media events lagged, resyncing"
                            );
                            self.resync().await;
                        }
                        Err(RecvError::Closed) => {
                            self.mark_failed();
                            break;
                        }
                    }
                }
            }
        }

        info!(target: "monitor.actor.capture_room", "Capture room stopped");
    }

    /// Returns `false` once the session is gone.
    async fn handle_event(&self, event: MediaEvent) -> bool {
        match event {
            MediaEvent::ParticipantConnected(participant) => {
                SubscriptionPolicy::Capture
                    .apply(self.session.as_ref(), &participant)
                    .await;
                self.refresh();
            }
            MediaEvent::TrackPublished {
                participant,
                publication,
            } => {
                match SubscriptionPolicy::Capture
                    .apply_to_track(self.session.as_ref(), &participant, &publication)
                    .await
                {
                    Ok(true) => {
                        debug!(
                            target: "monitor.actor.capture_room",
                            participant = %participant,
                            "Listening to viewer"
                        );
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!(
                            target: "monitor.actor.capture_room",
                            participant = %participant,
                            error = %e,
                            "Subscription change failed"
                        );
                    }
                }
                self.refresh();
            }
            MediaEvent::ParticipantDisconnected(_) | MediaEvent::TrackUnpublished { .. } => {
                self.refresh();
            }
            MediaEvent::ConnectionError(message) => {
                warn!(
                    target: "monitor.actor.capture_room",
                    error = %message,
                    "Media session error"
                );
                self.mark_failed();
                return false;
            }
            MediaEvent::Disconnected => {
                self.mark_failed();
                return false;
            }
            MediaEvent::TrackMuted { .. }
            | MediaEvent::TrackUnmuted { .. }
            | MediaEvent::LocalAudioPublished(_) => {}
        }
        true
    }

    async fn resync(&self) {
        for participant in self.session.participants() {
            SubscriptionPolicy::Capture
                .apply(self.session.as_ref(), &participant)
                .await;
        }
        self.refresh();
    }

    fn refresh(&self) {
        let listening_to: BTreeSet<ParticipantIdentity> = self
            .session
            .participants()
            .into_iter()
            .filter(|p| p.identity.is_viewer() && p.audio_tracks().any(|t| t.subscribed))
            .map(|p| p.identity)
            .collect();

        self.state.send_if_modified(|state| {
            if state.listening_to == listening_to {
                false
            } else {
                state.listening_to = listening_to;
                true
            }
        });
    }

    fn mark_failed(&self) {
        self.state.send_modify(|state| state.session_failed = true);
    }
}
