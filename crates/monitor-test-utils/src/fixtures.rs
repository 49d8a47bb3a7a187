//! Pre-built participants, users and rooms.

use common::identity::{AuthenticatedUser, IdentityHandle};
use common::media::{RemoteParticipant, TrackPublication};
use common::secret::SecretString;
use common::types::{ParticipantIdentity, RoomId, TrackKind};

/// Room used throughout the tests.
pub const TEST_ROOM: &str = "group-1";

/// UID of the signed-in test user.
pub const TEST_UID: &str = "uid-test";

#[must_use]
pub fn test_room() -> RoomId {
    RoomId::new(TEST_ROOM)
}

/// A signed-in test user.
#[must_use]
pub fn test_user() -> AuthenticatedUser {
    AuthenticatedUser::new(TEST_UID, SecretString::from("id-token-test")).with_email("parent@example.com")
}

/// Identity session fixed to [`test_user`].
#[must_use]
pub fn test_identity() -> IdentityHandle {
    IdentityHandle::fixed(test_user())
}

/// Camera participant `camera-<name>` publishing one audio and one video
/// track (`<name>-audio`, `<name>-video`), both unsubscribed.
#[must_use]
pub fn camera_participant(name: &str) -> RemoteParticipant {
    RemoteParticipant::new(ParticipantIdentity::camera(name))
        .with_track(TrackPublication::new(format!("{name}-audio"), TrackKind::Audio))
        .with_track(TrackPublication::new(format!("{name}-video"), TrackKind::Video))
}

/// Viewer participant `viewer-<name>` publishing one audio track
/// (`<name>-mic`), unsubscribed, muted or not.
#[must_use]
pub fn viewer_participant(name: &str, muted: bool) -> RemoteParticipant {
    let mut mic = TrackPublication::new(format!("{name}-mic"), TrackKind::Audio);
    mic.muted = muted;
    RemoteParticipant::new(ParticipantIdentity::viewer(name)).with_track(mic)
}
