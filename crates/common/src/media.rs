//! Media session capability.
//!
//! The media transport SDK is external. Components see it through two
//! traits: [`MediaConnector`] opens a session for a room, [`MediaSession`]
//! exposes the remote participants, their track publications, selective
//! subscription, local audio mute and a broadcast stream of [`MediaEvent`]s.
//!
//! Sessions are always opened with `auto_subscribe = false`; every
//! subscription is an explicit policy decision.

use crate::secret::SecretString;
use crate::types::{ParticipantIdentity, RoomId, TrackKind, TrackSid};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;

/// Pixel density used for previews (thumbnail quality).
pub const PREVIEW_PIXEL_DENSITY: f32 = 0.3;

/// Errors reported by the media capability.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MediaError {
    /// Could not open the session.
    #[error("Media connect failed: {0}")]
    Connect(String),

    /// Subscribe/unsubscribe or mute was refused.
    #[error("Media operation failed: {0}")]
    Operation(String),

    /// Participant or track is not (or no longer) in the session.
    #[error("Unknown track {sid} of {participant}")]
    UnknownTrack { participant: String, sid: String },

    /// The session is closed.
    #[error("Media session closed")]
    Closed,
}

/// A published track of a remote participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackPublication {
    pub sid: TrackSid,
    pub kind: TrackKind,
    pub subscribed: bool,
    pub muted: bool,
}

impl TrackPublication {
    /// Unsubscribed, unmuted publication.
    #[must_use]
    pub fn new(sid: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            sid: TrackSid::new(sid),
            kind,
            subscribed: false,
            muted: false,
        }
    }
}

/// A remote participant with its track publications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteParticipant {
    pub identity: ParticipantIdentity,
    pub tracks: Vec<TrackPublication>,
}

impl RemoteParticipant {
    #[must_use]
    pub fn new(identity: ParticipantIdentity) -> Self {
        Self {
            identity,
            tracks: Vec::new(),
        }
    }

    /// Builder-style track addition.
    #[must_use]
    pub fn with_track(mut self, track: TrackPublication) -> Self {
        self.tracks.push(track);
        self
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &TrackPublication> {
        self.tracks.iter().filter(|t| t.kind == TrackKind::Audio)
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &TrackPublication> {
        self.tracks.iter().filter(|t| t.kind == TrackKind::Video)
    }

    /// Whether any audio publication is currently unmuted.
    #[must_use]
    pub fn has_unmuted_audio(&self) -> bool {
        self.audio_tracks().any(|t| !t.muted)
    }

    #[must_use]
    pub fn track(&self, sid: &TrackSid) -> Option<&TrackPublication> {
        self.tracks.iter().find(|t| &t.sid == sid)
    }
}

/// Change notifications emitted by a media session, in delivery order.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    ParticipantConnected(RemoteParticipant),
    ParticipantDisconnected(ParticipantIdentity),
    TrackPublished {
        participant: ParticipantIdentity,
        publication: TrackPublication,
    },
    TrackUnpublished {
        participant: ParticipantIdentity,
        sid: TrackSid,
    },
    TrackMuted {
        participant: ParticipantIdentity,
        sid: TrackSid,
    },
    TrackUnmuted {
        participant: ParticipantIdentity,
        sid: TrackSid,
    },
    /// A local audio track became available (microphone published).
    LocalAudioPublished(TrackSid),
    /// The SDK reported a connection error.
    ConnectionError(String),
    /// The session ended.
    Disconnected,
}

/// Camera facing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FacingMode {
    #[default]
    User,
    Environment,
}

impl FacingMode {
    /// The other facing mode.
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            FacingMode::User => FacingMode::Environment,
            FacingMode::Environment => FacingMode::User,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            FacingMode::User => "user",
            FacingMode::Environment => "environment",
        }
    }
}

/// Adaptive stream pixel density.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PixelDensity {
    /// Follow the device screen.
    Screen,
    /// Fixed ratio.
    Fixed(f32),
}

/// Options for opening a media session.
#[derive(Debug, Clone)]
pub struct MediaConnectOptions {
    pub server_url: String,
    pub room: RoomId,
    pub identity: ParticipantIdentity,
    pub token: SecretString,
    /// Publish the microphone.
    pub publish_audio: bool,
    /// Publish the camera with this facing mode.
    pub publish_video: Option<FacingMode>,
    pub pixel_density: PixelDensity,
    /// Always `false`: subscriptions are decided by policy.
    pub auto_subscribe: bool,
}

impl MediaConnectOptions {
    /// Thumbnail preview: publishes nothing, low pixel density.
    #[must_use]
    pub fn preview(
        server_url: impl Into<String>,
        room: RoomId,
        identity: ParticipantIdentity,
        token: SecretString,
    ) -> Self {
        Self {
            server_url: server_url.into(),
            room,
            identity,
            token,
            publish_audio: false,
            publish_video: None,
            pixel_density: PixelDensity::Fixed(PREVIEW_PIXEL_DENSITY),
            auto_subscribe: false,
        }
    }

    /// Full viewer: publishes the microphone for push-to-talk.
    #[must_use]
    pub fn viewer(
        server_url: impl Into<String>,
        room: RoomId,
        identity: ParticipantIdentity,
        token: SecretString,
    ) -> Self {
        Self {
            server_url: server_url.into(),
            room,
            identity,
            token,
            publish_audio: true,
            publish_video: None,
            pixel_density: PixelDensity::Screen,
            auto_subscribe: false,
        }
    }

    /// Camera capture: publishes microphone and camera.
    #[must_use]
    pub fn capture(
        server_url: impl Into<String>,
        room: RoomId,
        identity: ParticipantIdentity,
        token: SecretString,
        facing_mode: FacingMode,
    ) -> Self {
        Self {
            server_url: server_url.into(),
            room,
            identity,
            token,
            publish_audio: true,
            publish_video: Some(facing_mode),
            pixel_density: PixelDensity::Screen,
            auto_subscribe: false,
        }
    }
}

/// An open media session.
#[async_trait]
pub trait MediaSession: Send + Sync {
    /// Remote participants currently present.
    fn participants(&self) -> Vec<RemoteParticipant>;

    /// A single remote participant, if present.
    fn participant(&self, identity: &ParticipantIdentity) -> Option<RemoteParticipant> {
        self.participants()
            .into_iter()
            .find(|p| &p.identity == identity)
    }

    /// Subscribe to change notifications.
    ///
    /// Subscribe before reading [`MediaSession::participants`] so no change
    /// falls between the snapshot and the stream.
    fn events(&self) -> broadcast::Receiver<MediaEvent>;

    /// Subscribe to or unsubscribe from one remote track.
    async fn set_subscribed(
        &self,
        participant: &ParticipantIdentity,
        sid: &TrackSid,
        subscribed: bool,
    ) -> Result<(), MediaError>;

    /// Local audio tracks, in publication order.
    fn local_audio_tracks(&self) -> Vec<TrackSid>;

    /// Mute or unmute a local audio track.
    async fn set_local_audio_muted(&self, sid: &TrackSid, muted: bool) -> Result<(), MediaError>;

    /// Leave the room. Idempotent.
    async fn disconnect(&self);
}

/// Opens media sessions.
#[async_trait]
pub trait MediaConnector: Send + Sync {
    async fn connect(
        &self,
        options: MediaConnectOptions,
    ) -> Result<Arc<dyn MediaSession>, MediaError>;
}
