//! Selective subscription policies.
//!
//! Sessions never auto-subscribe. A policy decides, per remote track
//! publication, whether it should be subscribed (`Some(true)`), explicitly
//! unsubscribed (`Some(false)`) or left alone (`None`). Applying a policy only
//! calls the media session when the current state differs from the decision.

use common::media::{MediaError, MediaSession, RemoteParticipant, TrackPublication};
use common::types::{ParticipantIdentity, ParticipantRole, TrackKind};
use tracing::{debug, warn};

/// Subscription policy of a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionPolicy {
    /// Thumbnail: camera video only, camera audio explicitly off.
    Preview,
    /// Full viewer: camera video and one camera audio track.
    FullViewer,
    /// Camera side: viewer audio only (push-to-talk).
    Capture,
}

impl SubscriptionPolicy {
    /// Decision for one publication owned by `owner`.
    #[must_use]
    pub fn decide(self, owner: &ParticipantIdentity, publication: &TrackPublication) -> Option<bool> {
        match (self, owner.role(), publication.kind) {
            (SubscriptionPolicy::Preview, ParticipantRole::Camera, TrackKind::Video)
            | (SubscriptionPolicy::FullViewer, ParticipantRole::Camera, _)
            | (SubscriptionPolicy::Capture, ParticipantRole::Viewer, TrackKind::Audio) => Some(true),
            (SubscriptionPolicy::Preview, ParticipantRole::Camera, TrackKind::Audio) => Some(false),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            SubscriptionPolicy::Preview => "preview",
            SubscriptionPolicy::FullViewer => "full_viewer",
            SubscriptionPolicy::Capture => "capture",
        }
    }

    /// Decision for one publication, given the rest of its owner's tracks.
    ///
    /// A full viewer holds at most one camera audio publication: a further
    /// audio track is turned off while another one is subscribed.
    #[must_use]
    pub fn decide_within(
        self,
        participant: &RemoteParticipant,
        publication: &TrackPublication,
    ) -> Option<bool> {
        let wanted = self.decide(&participant.identity, publication)?;
        if !(wanted && self.holds_single_audio(&participant.identity, publication)) {
            return Some(wanted);
        }
        let held = participant
            .audio_tracks()
            .any(|t| t.subscribed && t.sid != publication.sid);
        Some(!held)
    }

    fn holds_single_audio(self, owner: &ParticipantIdentity, publication: &TrackPublication) -> bool {
        self == SubscriptionPolicy::FullViewer
            && owner.role() == ParticipantRole::Camera
            && publication.kind == TrackKind::Audio
    }

    /// Apply the policy to one publication.
    ///
    /// The owner's other tracks are read from the session. Returns whether a
    /// subscription call was made.
    ///
    /// # Errors
    ///
    /// Propagates the media session's refusal.
    pub async fn apply_to_track(
        self,
        session: &dyn MediaSession,
        owner: &ParticipantIdentity,
        publication: &TrackPublication,
    ) -> Result<bool, MediaError> {
        let participant = session
            .participant(owner)
            .unwrap_or_else(|| RemoteParticipant::new(owner.clone()).with_track(publication.clone()));
        self.set(session, &participant, publication).await
    }

    async fn set(
        self,
        session: &dyn MediaSession,
        participant: &RemoteParticipant,
        publication: &TrackPublication,
    ) -> Result<bool, MediaError> {
        let Some(wanted) = self.decide_within(participant, publication) else {
            return Ok(false);
        };
        if wanted == publication.subscribed {
            return Ok(false);
        }

        debug!(
            target: "monitor.policy",
            policy = self.as_str(),
            participant = %participant.identity,
            sid = %publication.sid,
            kind = publication.kind.as_str(),
            subscribe = wanted,
            "Applying subscription"
        );
        session
            .set_subscribed(&participant.identity, &publication.sid, wanted)
            .await?;
        Ok(true)
    }

    /// Apply the policy to every publication of `participant`.
    ///
    /// Failures are logged per track and do not stop the remaining tracks.
    /// Returns the number of subscription calls made.
    pub async fn apply(self, session: &dyn MediaSession, participant: &RemoteParticipant) -> usize {
        let mut current = participant.clone();
        let mut calls = 0;
        for publication in &participant.tracks {
            let seen = current.track(&publication.sid).cloned().unwrap_or_else(|| publication.clone());
            match self.set(session, &current, &seen).await {
                Ok(true) => {
                    calls += 1;
                    if let Some(track) = current.tracks.iter_mut().find(|t| t.sid == seen.sid) {
                        track.subscribed = !track.subscribed;
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        target: "monitor.policy",
                        participant = %participant.identity,
                        sid = %publication.sid,
                        error = %e,
                        "Subscription change failed"
                    );
                }
            }
        }
        calls
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use common::types::TrackSid;
    use monitor_test_utils::{camera_participant, viewer_participant, MockMediaSession};

    fn audio() -> TrackPublication {
        TrackPublication::new("a", TrackKind::Audio)
    }

    fn video() -> TrackPublication {
        TrackPublication::new("v", TrackKind::Video)
    }

    #[test]
    fn test_preview_decisions() {
        let camera = ParticipantIdentity::camera("Luna");
        let viewer = ParticipantIdentity::viewer("Ana");
        let policy = SubscriptionPolicy::Preview;

        assert_eq!(policy.decide(&camera, &video()), Some(true));
        assert_eq!(policy.decide(&camera, &audio()), Some(false));
        assert_eq!(policy.decide(&viewer, &audio()), None);
        assert_eq!(policy.decide(&viewer, &video()), None);
    }

    #[test]
    fn test_full_viewer_decisions() {
        let camera = ParticipantIdentity::camera("Luna");
        let viewer = ParticipantIdentity::viewer("Ana");
        let policy = SubscriptionPolicy::FullViewer;

        assert_eq!(policy.decide(&camera, &video()), Some(true));
        assert_eq!(policy.decide(&camera, &audio()), Some(true));
        assert_eq!(policy.decide(&viewer, &audio()), None);
    }

    #[test]
    fn test_capture_decisions() {
        let camera = ParticipantIdentity::camera("Luna");
        let viewer = ParticipantIdentity::viewer("Ana");
        let preview = ParticipantIdentity::parse("thumbnail-viewer-Luna-1");
        let policy = SubscriptionPolicy::Capture;

        assert_eq!(policy.decide(&viewer, &audio()), Some(true));
        assert_eq!(policy.decide(&viewer, &video()), None);
        assert_eq!(policy.decide(&camera, &audio()), None);
        assert_eq!(policy.decide(&preview, &audio()), None);
    }

    #[tokio::test]
    async fn test_apply_is_differential() {
        let session = MockMediaSession::new();
        let mut luna = camera_participant("Luna");
        for track in &mut luna.tracks {
            track.subscribed = true;
        }
        session.add_participant(luna.clone());

        // Video already subscribed, audio must be turned off.
        let calls = SubscriptionPolicy::Preview.apply(&session, &luna).await;
        assert_eq!(calls, 1);

        let luna = session.participant(&luna.identity).unwrap();
        assert!(luna.audio_tracks().all(|t| !t.subscribed));
        assert!(luna.video_tracks().all(|t| t.subscribed));

        // Nothing left to change.
        assert_eq!(SubscriptionPolicy::Preview.apply(&session, &luna).await, 0);
    }

    #[tokio::test]
    async fn test_apply_capture_touches_only_viewer_audio() {
        let session = MockMediaSession::new();
        let ana = viewer_participant("Ana", false);
        let luna = camera_participant("Luna");
        session.add_participant(ana.clone());
        session.add_participant(luna.clone());

        assert_eq!(SubscriptionPolicy::Capture.apply(&session, &ana).await, 1);
        assert_eq!(SubscriptionPolicy::Capture.apply(&session, &luna).await, 0);
        assert_eq!(session.subscription_calls().len(), 1);
    }

    #[test]
    fn test_full_viewer_holds_one_camera_audio() {
        let luna = camera_participant("Luna")
            .with_track(TrackPublication::new("Luna-audio-2", TrackKind::Audio));
        let second = TrackPublication::new("Luna-audio-2", TrackKind::Audio);
        let policy = SubscriptionPolicy::FullViewer;

        // Nothing held yet.
        assert_eq!(policy.decide_within(&luna, &second), Some(true));

        let mut held = luna.clone();
        for track in &mut held.tracks {
            track.subscribed = track.sid.0 == "Luna-audio";
        }
        assert_eq!(policy.decide_within(&held, &second), Some(false));
        let first = held.track(&TrackSid::new("Luna-audio")).cloned().unwrap();
        assert_eq!(policy.decide_within(&held, &first), Some(true));
    }

    #[tokio::test]
    async fn test_apply_full_viewer_subscribes_single_audio() {
        let session = MockMediaSession::new();
        let luna = camera_participant("Luna")
            .with_track(TrackPublication::new("Luna-audio-2", TrackKind::Audio));
        session.add_participant(luna.clone());

        SubscriptionPolicy::FullViewer.apply(&session, &luna).await;

        let luna = session.participant(&luna.identity).unwrap();
        assert_eq!(luna.audio_tracks().filter(|t| t.subscribed).count(), 1);
        assert!(luna.video_tracks().all(|t| t.subscribed));

        // A later audio publication stays off while one is held.
        let late = TrackPublication::new("Luna-audio-3", TrackKind::Audio);
        session.publish_track(&luna.identity, late.clone());
        let called = SubscriptionPolicy::FullViewer
            .apply_to_track(&session, &luna.identity, &late)
            .await
            .unwrap();
        assert!(!called);
        let luna = session.participant(&luna.identity).unwrap();
        assert_eq!(luna.audio_tracks().filter(|t| t.subscribed).count(), 1);
    }
}
