//! In-memory media session and connector.
//!
//! `MockMediaSession` keeps a participant list, emits the same change events a
//! real session would, and records every subscription and mute call so tests
//! can assert on policy decisions.
//!
//! # Example
//!
//! ```rust,ignore
//! use monitor_test_utils::{camera_participant, MockMediaSession};
//!
//! let session = Arc::new(MockMediaSession::new());
//! session.add_participant(camera_participant("Luna"));
//! // ... spawn an actor on `session.clone()` ...
//! assert_eq!(session.subscription_calls().len(), 1);
//! ```

use async_trait::async_trait;
use common::media::{
    MediaConnectOptions, MediaConnector, MediaError, MediaEvent, MediaSession, RemoteParticipant,
    TrackPublication,
};
use common::types::{ParticipantIdentity, TrackSid};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

const EVENT_BUFFER: usize = 256;

/// A recorded `set_subscribed` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionCall {
    pub participant: ParticipantIdentity,
    pub sid: TrackSid,
    pub subscribed: bool,
}

#[derive(Debug, Default)]
struct RoomState {
    participants: Vec<RemoteParticipant>,
    /// Local audio tracks with their mute flag.
    local_audio: Vec<(TrackSid, bool)>,
    subscription_calls: Vec<SubscriptionCall>,
    mute_calls: Vec<(TrackSid, bool)>,
    fail_subscriptions: bool,
    disconnected: bool,
}

/// In-memory media session.
#[derive(Debug)]
pub struct MockMediaSession {
    state: Mutex<RoomState>,
    events: broadcast::Sender<MediaEvent>,
}

impl Default for MockMediaSession {
    fn default() -> Self {
        Self::new()
    }
}

impl MockMediaSession {
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            state: Mutex::new(RoomState::default()),
            events,
        }
    }

    /// Emit an arbitrary event without touching the participant list.
    pub fn emit(&self, event: MediaEvent) {
        let _ = self.events.send(event);
    }

    /// A participant joins (or rejoins with fresh publications).
    pub fn add_participant(&self, participant: RemoteParticipant) {
        {
            let mut state = self.state.lock().unwrap();
            state
                .participants
                .retain(|p| p.identity != participant.identity);
            state.participants.push(participant.clone());
        }
        self.emit(MediaEvent::ParticipantConnected(participant));
    }

    /// A participant leaves.
    pub fn remove_participant(&self, identity: &ParticipantIdentity) {
        self.state
            .lock()
            .unwrap()
            .participants
            .retain(|p| &p.identity != identity);
        self.emit(MediaEvent::ParticipantDisconnected(identity.clone()));
    }

    /// A present participant publishes another track.
    pub fn publish_track(&self, identity: &ParticipantIdentity, publication: TrackPublication) {
        {
            let mut state = self.state.lock().unwrap();
            let participant = state
                .participants
                .iter_mut()
                .find(|p| &p.identity == identity)
                .expect("publish_track on absent participant");
            participant.tracks.push(publication.clone());
        }
        self.emit(MediaEvent::TrackPublished {
            participant: identity.clone(),
            publication,
        });
    }

    /// A remote track is muted or unmuted by its owner.
    pub fn set_track_muted(&self, identity: &ParticipantIdentity, sid: &TrackSid, muted: bool) {
        {
            let mut state = self.state.lock().unwrap();
            if let Some(track) = state
                .participants
                .iter_mut()
                .find(|p| &p.identity == identity)
                .and_then(|p| p.tracks.iter_mut().find(|t| &t.sid == sid))
            {
                track.muted = muted;
            }
        }
        let participant = identity.clone();
        let sid = sid.clone();
        self.emit(if muted {
            MediaEvent::TrackMuted { participant, sid }
        } else {
            MediaEvent::TrackUnmuted { participant, sid }
        });
    }

    /// The local microphone is published (unmuted).
    pub fn publish_local_audio(&self, sid: impl Into<String>) {
        let sid = TrackSid::new(sid);
        self.state
            .lock()
            .unwrap()
            .local_audio
            .push((sid.clone(), false));
        self.emit(MediaEvent::LocalAudioPublished(sid));
    }

    /// The SDK reports a connection error.
    pub fn fail(&self, message: &str) {
        self.emit(MediaEvent::ConnectionError(message.to_string()));
    }

    /// Make subsequent `set_subscribed` calls fail.
    pub fn fail_subscriptions(&self, fail: bool) {
        self.state.lock().unwrap().fail_subscriptions = fail;
    }

    #[must_use]
    pub fn subscription_calls(&self) -> Vec<SubscriptionCall> {
        self.state.lock().unwrap().subscription_calls.clone()
    }

    #[must_use]
    pub fn local_mute_calls(&self) -> Vec<(TrackSid, bool)> {
        self.state.lock().unwrap().mute_calls.clone()
    }

    /// Mute flag of a local audio track.
    #[must_use]
    pub fn local_audio_muted(&self, sid: &str) -> Option<bool> {
        self.state
            .lock()
            .unwrap()
            .local_audio
            .iter()
            .find(|(s, _)| s.0 == sid)
            .map(|(_, muted)| *muted)
    }

    /// Current snapshot of a remote participant.
    #[must_use]
    pub fn participant(&self, identity: &ParticipantIdentity) -> Option<RemoteParticipant> {
        self.state
            .lock()
            .unwrap()
            .participants
            .iter()
            .find(|p| &p.identity == identity)
            .cloned()
    }

    #[must_use]
    pub fn is_disconnected(&self) -> bool {
        self.state.lock().unwrap().disconnected
    }
}

#[async_trait]
impl MediaSession for MockMediaSession {
    fn participants(&self) -> Vec<RemoteParticipant> {
        self.state.lock().unwrap().participants.clone()
    }

    fn events(&self) -> broadcast::Receiver<MediaEvent> {
        self.events.subscribe()
    }

    async fn set_subscribed(
        &self,
        participant: &ParticipantIdentity,
        sid: &TrackSid,
        subscribed: bool,
    ) -> Result<(), MediaError> {
        let mut state = self.state.lock().unwrap();
        state.subscription_calls.push(SubscriptionCall {
            participant: participant.clone(),
            sid: sid.clone(),
            subscribed,
        });

        if state.disconnected {
            return Err(MediaError::Closed);
        }
        if state.fail_subscriptions {
            return Err(MediaError::Operation("subscription refused".to_string()));
        }

        let track = state
            .participants
            .iter_mut()
            .find(|p| &p.identity == participant)
            .and_then(|p| p.tracks.iter_mut().find(|t| &t.sid == sid))
            .ok_or_else(|| MediaError::UnknownTrack {
                participant: participant.to_string(),
                sid: sid.to_string(),
            })?;
        track.subscribed = subscribed;
        Ok(())
    }

    fn local_audio_tracks(&self) -> Vec<TrackSid> {
        self.state
            .lock()
            .unwrap()
            .local_audio
            .iter()
            .map(|(sid, _)| sid.clone())
            .collect()
    }

    async fn set_local_audio_muted(&self, sid: &TrackSid, muted: bool) -> Result<(), MediaError> {
        let mut state = self.state.lock().unwrap();
        state.mute_calls.push((sid.clone(), muted));
        let track = state
            .local_audio
            .iter_mut()
            .find(|(s, _)| s == sid)
            .ok_or_else(|| MediaError::UnknownTrack {
                participant: "local".to_string(),
                sid: sid.to_string(),
            })?;
        track.1 = muted;
        Ok(())
    }

    async fn disconnect(&self) {
        let first = {
            let mut state = self.state.lock().unwrap();
            !std::mem::replace(&mut state.disconnected, true)
        };
        if first {
            self.emit(MediaEvent::Disconnected);
        }
    }
}

// =============================================================================
// Connector
// =============================================================================

#[derive(Debug, Default)]
struct ConnectorState {
    queued: VecDeque<Arc<MockMediaSession>>,
    opened: Vec<Arc<MockMediaSession>>,
    options: Vec<MediaConnectOptions>,
    failure: Option<String>,
    delay: Option<Duration>,
}

/// Media connector handing out `MockMediaSession`s.
///
/// Queued sessions are returned first; afterwards every connect opens a
/// fresh empty session.
#[derive(Debug, Default)]
pub struct MockMediaConnector {
    state: Mutex<ConnectorState>,
}

impl MockMediaConnector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `session` on the next connect.
    #[must_use]
    pub fn with_session(self, session: Arc<MockMediaSession>) -> Self {
        self.state.lock().unwrap().queued.push_back(session);
        self
    }

    /// Fail every connect.
    #[must_use]
    pub fn failing(message: &str) -> Self {
        let connector = Self::default();
        connector.state.lock().unwrap().failure = Some(message.to_string());
        connector
    }

    /// Take `delay` before every connect completes.
    #[must_use]
    pub fn with_delay(self, delay: Duration) -> Self {
        self.state.lock().unwrap().delay = Some(delay);
        self
    }

    #[must_use]
    pub fn connect_count(&self) -> usize {
        self.state.lock().unwrap().options.len()
    }

    /// Options of every connect, in order.
    #[must_use]
    pub fn connect_options(&self) -> Vec<MediaConnectOptions> {
        self.state.lock().unwrap().options.clone()
    }

    /// Sessions handed out so far, in order.
    #[must_use]
    pub fn opened_sessions(&self) -> Vec<Arc<MockMediaSession>> {
        self.state.lock().unwrap().opened.clone()
    }
}

#[async_trait]
impl MediaConnector for MockMediaConnector {
    async fn connect(
        &self,
        options: MediaConnectOptions,
    ) -> Result<Arc<dyn MediaSession>, MediaError> {
        let delay = self.state.lock().unwrap().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        state.options.push(options);
        if let Some(message) = &state.failure {
            return Err(MediaError::Connect(message.clone()));
        }

        let session = state
            .queued
            .pop_front()
            .unwrap_or_else(|| Arc::new(MockMediaSession::new()));
        state.opened.push(session.clone());
        Ok(session)
    }
}
