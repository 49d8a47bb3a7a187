//! `CameraPresenceActor` - tracks one named camera inside a media session.
//!
//! Each actor:
//! - Waits for the camera participant to be sighted (first-sight timeout)
//! - Applies the view's subscription policy on sighting and on later
//!   publications
//! - Absorbs short departures (settle delay) before confirming the camera
//!   offline
//!
//! # State machine
//!
//! ```text
//! AwaitingFirstSight ──sighted──▶ Live ──absent ≥ settle──▶ ConfirmedOffline(Departed)
//!        │                         ▲ │
//!        │                         └─┘ reappears < settle (Reconnected)
//!        └──timeout──▶ ConfirmedOffline(NeverSighted)
//!
//! any state ──session error/closed──▶ ConfirmedOffline(SessionFailed)
//! ```
//!
//! `ConfirmedOffline` is terminal: the actor signals it once and exits.
//! Re-attaching spawns a fresh actor. Detaching (cancel or dropping the
//! handle) discards both timers with the actor.

use crate::config::PresenceTiming;
use crate::observability::metrics;
use crate::policy::SubscriptionPolicy;

use common::media::{MediaEvent, MediaSession, RemoteParticipant, TrackPublication};
use common::types::{CameraName, ParticipantIdentity};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, instrument, warn};

/// Why a camera is considered offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OfflineReason {
    /// Not sighted within the first-sight timeout.
    NeverSighted,
    /// Sighted, then absent for at least the settle delay.
    Departed,
    /// The media session failed or closed.
    SessionFailed,
}

impl OfflineReason {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            OfflineReason::NeverSighted => "never_sighted",
            OfflineReason::Departed => "departed",
            OfflineReason::SessionFailed => "session_failed",
        }
    }

    const fn metric_state(self) -> &'static str {
        match self {
            OfflineReason::NeverSighted => "offline_never_sighted",
            OfflineReason::Departed => "offline_departed",
            OfflineReason::SessionFailed => "offline_session_failed",
        }
    }
}

/// Observed state of a tracked camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceState {
    AwaitingFirstSight,
    Live,
    ConfirmedOffline(OfflineReason),
}

impl PresenceState {
    #[must_use]
    pub fn is_offline(&self) -> bool {
        matches!(self, PresenceState::ConfirmedOffline(_))
    }
}

/// Transition reported to the owner of the actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceChange {
    /// First sighting.
    Live,
    /// Back within the settle delay; policy re-applied.
    Reconnected,
    /// Terminal. Signalled at most once.
    Offline(OfflineReason),
}

/// A presence transition of one camera.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceSignal {
    pub camera: CameraName,
    pub change: PresenceChange,
}

/// Handle to a `CameraPresenceActor`.
///
/// Dropping the handle detaches the actor.
pub struct CameraPresenceHandle {
    camera: CameraName,
    state: watch::Receiver<PresenceState>,
    cancel_token: CancellationToken,
    _detach_on_drop: DropGuard,
}

impl CameraPresenceHandle {
    #[must_use]
    pub fn camera(&self) -> &CameraName {
        &self.camera
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> PresenceState {
        *self.state.borrow()
    }

    /// Watch state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PresenceState> {
        self.state.clone()
    }

    /// Detach the actor. Pending timers never fire.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

/// The `CameraPresenceActor` implementation.
pub struct CameraPresenceActor {
    camera: CameraName,
    identity: ParticipantIdentity,
    session: Arc<dyn MediaSession>,
    policy: SubscriptionPolicy,
    timing: PresenceTiming,
    cancel_token: CancellationToken,
    state: PresenceState,
    state_tx: watch::Sender<PresenceState>,
    signals: mpsc::Sender<PresenceSignal>,
    /// Set on the first sighting, never cleared.
    sighted: bool,
    first_sight_deadline: Option<Instant>,
    settle_deadline: Option<Instant>,
}

impl CameraPresenceActor {
    /// Spawn a presence actor for `camera` on `session`.
    ///
    /// Transitions are sent on `signals`; a closed receiver is tolerated.
    pub fn spawn(
        camera: CameraName,
        session: Arc<dyn MediaSession>,
        policy: SubscriptionPolicy,
        timing: PresenceTiming,
        signals: mpsc::Sender<PresenceSignal>,
        cancel_token: CancellationToken,
    ) -> (CameraPresenceHandle, JoinHandle<()>) {
        let (state_tx, state_rx) = watch::channel(PresenceState::AwaitingFirstSight);

        let actor = Self {
            identity: camera.participant_identity(),
            camera: camera.clone(),
            session,
            policy,
            timing,
            cancel_token: cancel_token.clone(),
            state: PresenceState::AwaitingFirstSight,
            state_tx,
            signals,
            sighted: false,
            first_sight_deadline: None,
            settle_deadline: None,
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = CameraPresenceHandle {
            camera,
            state: state_rx,
            _detach_on_drop: cancel_token.clone().drop_guard(),
            cancel_token,
        };

        (handle, task_handle)
    }

    #[instrument(skip_all, name = "monitor.actor.presence", fields(camera = %self.camera, policy = self.policy.as_str()))]
    async fn run(mut self) {
        info!(
            target: "monitor.actor.presence",
            camera = %self.camera,
            "Presence tracking started"
        );

        // Subscribe before the snapshot so nothing falls in between.
        let mut events = self.session.events();

        match self.session.participant(&self.identity) {
            Some(participant) => self.on_sighted(participant).await,
            None => {
                self.first_sight_deadline = Some(Instant::now() + self.timing.first_sight_timeout);
            }
        }

        while !self.state.is_offline() {
            tokio::select! {
                biased;

                () = self.cancel_token.cancelled() => {
                    debug!(
                        target: "monitor.actor.presence",
                        camera = %self.camera,
                        "Presence tracking detached"
                    );
                    break;
                }

                () = wait_until(self.first_sight_deadline) => {
                    self.on_first_sight_elapsed().await;
                }

                () = wait_until(self.settle_deadline) => {
                    self.on_settle_elapsed().await;
                }

                event = events.recv() => {
                    match event {
                        Ok(event) => self.handle_event(event).await,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(
                                target: "monitor.actor.presence",
                                camera = %self.camera,
                                skipped,
                                "Media events lagged, resyncing"
                            );
                            self.resync().await;
                        }
                        Err(RecvError::Closed) => {
                            self.confirm_offline(OfflineReason::SessionFailed).await;
                        }
                    }
                }
            }
        }

        info!(
            target: "monitor.actor.presence",
            camera = %self.camera,
            state = ?self.state,
            "Presence tracking stopped"
        );
    }

    async fn handle_event(&mut self, event: MediaEvent) {
        match event {
            MediaEvent::ParticipantConnected(participant) if participant.identity == self.identity => {
                self.on_sighted(participant).await;
            }
            MediaEvent::ParticipantDisconnected(identity) if identity == self.identity => {
                self.on_absent();
            }
            MediaEvent::TrackPublished {
                participant,
                publication,
            } if participant == self.identity => {
                self.on_track_published(&publication).await;
            }
            MediaEvent::ConnectionError(message) => {
                warn!(
                    target: "monitor.actor.presence",
                    camera = %self.camera,
                    error = %message,
                    "Media session error"
                );
                self.confirm_offline(OfflineReason::SessionFailed).await;
            }
            MediaEvent::Disconnected => {
                self.confirm_offline(OfflineReason::SessionFailed).await;
            }
            _ => {}
        }
    }

    async fn on_sighted(&mut self, participant: RemoteParticipant) {
        match self.state {
            PresenceState::AwaitingFirstSight => {
                self.first_sight_deadline = None;
                self.sighted = true;
                self.set_state(PresenceState::Live);
                self.policy.apply(self.session.as_ref(), &participant).await;
                metrics::record_presence_transition("live");
                info!(
                    target: "monitor.actor.presence",
                    camera = %self.camera,
                    "Camera sighted"
                );
                self.signal(PresenceChange::Live).await;
            }
            PresenceState::Live => {
                self.policy.apply(self.session.as_ref(), &participant).await;
                if self.settle_deadline.take().is_some() {
                    metrics::record_presence_transition("reconnected");
                    debug!(
                        target: "monitor.actor.presence",
                        camera = %self.camera,
                        "Camera back within settle delay"
                    );
                    self.signal(PresenceChange::Reconnected).await;
                }
            }
            PresenceState::ConfirmedOffline(_) => {}
        }
    }

    fn on_absent(&mut self) {
        if self.state == PresenceState::Live && self.settle_deadline.is_none() {
            debug!(
                target: "monitor.actor.presence",
                camera = %self.camera,
                settle_delay_ms = u64::try_from(self.timing.settle_delay.as_millis()).unwrap_or(u64::MAX),
                "Camera absent, settling"
            );
            self.settle_deadline = Some(Instant::now() + self.timing.settle_delay);
        }
    }

    async fn on_track_published(&mut self, publication: &TrackPublication) {
        if self.state != PresenceState::Live || self.settle_deadline.is_some() {
            return;
        }
        if let Err(e) = self
            .policy
            .apply_to_track(self.session.as_ref(), &self.identity, publication)
            .await
        {
            warn!(
                target: "monitor.actor.presence",
                camera = %self.camera,
                sid = %publication.sid,
                error = %e,
                "Subscription change failed"
            );
        }
    }

    async fn on_first_sight_elapsed(&mut self) {
        if self.state != PresenceState::AwaitingFirstSight {
            self.first_sight_deadline = None;
            return;
        }
        match self.session.participant(&self.identity) {
            Some(participant) => self.on_sighted(participant).await,
            None => self.confirm_offline(OfflineReason::NeverSighted).await,
        }
    }

    async fn on_settle_elapsed(&mut self) {
        // The departure is only confirmed if the camera is still absent.
        // Both paths clear the settle deadline.
        match self.session.participant(&self.identity) {
            Some(participant) => self.on_sighted(participant).await,
            None => self.confirm_offline(OfflineReason::Departed).await,
        }
    }

    async fn resync(&mut self) {
        match self.session.participant(&self.identity) {
            Some(participant) => self.on_sighted(participant).await,
            None => self.on_absent(),
        }
    }

    async fn confirm_offline(&mut self, reason: OfflineReason) {
        if self.state.is_offline() {
            return;
        }
        self.first_sight_deadline = None;
        self.settle_deadline = None;
        self.set_state(PresenceState::ConfirmedOffline(reason));
        metrics::record_presence_transition(reason.metric_state());
        info!(
            target: "monitor.actor.presence",
            camera = %self.camera,
            reason = reason.as_str(),
            sighted = self.sighted,
            "Camera confirmed offline"
        );
        self.signal(PresenceChange::Offline(reason)).await;
    }

    fn set_state(&mut self, state: PresenceState) {
        self.state = state;
        self.state_tx.send_replace(state);
    }

    async fn signal(&self, change: PresenceChange) {
        let signal = PresenceSignal {
            camera: self.camera.clone(),
            change,
        };
        if self.signals.send(signal).await.is_err() {
            debug!(
                target: "monitor.actor.presence",
                camera = %self.camera,
                "Presence signal receiver gone"
            );
        }
    }
}

/// Sleep until `deadline`, or forever when there is none.
pub(crate) async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
