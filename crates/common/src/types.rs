//! Common data types for the monitor components.
//!
//! Participant identities arrive from the media session as plain strings
//! (`camera-Luna`, `viewer-Ana`, ...). They are parsed exactly once, where the
//! session reports a participant, into a [`ParticipantIdentity`] carrying an
//! explicit [`ParticipantRole`]. Nothing downstream matches on prefixes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity prefix of camera-producing participants.
pub const CAMERA_PREFIX: &str = "camera-";

/// Identity prefix of full viewer participants.
pub const VIEWER_PREFIX: &str = "viewer-";

/// Identity prefix of thumbnail preview sessions.
pub const PREVIEW_PREFIX: &str = "thumbnail-viewer-";

/// Identifier of a room (a monitoring group).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    /// Create a room ID from any string-like value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name of a camera as assigned to a subject (usually the baby's name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CameraName(pub String);

impl CameraName {
    /// Create a camera name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrow the raw name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The participant identity a camera with this name publishes under.
    #[must_use]
    pub fn participant_identity(&self) -> ParticipantIdentity {
        ParticipantIdentity::camera(self.0.clone())
    }
}

impl fmt::Display for CameraName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role of a participant in a media session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    /// Publishes camera audio/video.
    Camera,
    /// Full viewer; may publish push-to-talk audio.
    Viewer,
    /// Thumbnail preview; subscribes to video only.
    Preview,
    /// Anything that does not follow the naming convention.
    Other,
}

impl ParticipantRole {
    /// Returns the role as a string for logs and metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ParticipantRole::Camera => "camera",
            ParticipantRole::Viewer => "viewer",
            ParticipantRole::Preview => "preview",
            ParticipantRole::Other => "other",
        }
    }
}

/// Typed participant identity.
///
/// Immutable once built, so the role and camera mapping of a participant
/// cannot change for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticipantIdentity {
    role: ParticipantRole,
    name: String,
}

impl ParticipantIdentity {
    /// Identity of the camera named `name`.
    #[must_use]
    pub fn camera(name: impl Into<String>) -> Self {
        Self {
            role: ParticipantRole::Camera,
            name: name.into(),
        }
    }

    /// Identity of the viewer named `name`.
    #[must_use]
    pub fn viewer(name: impl Into<String>) -> Self {
        Self {
            role: ParticipantRole::Viewer,
            name: name.into(),
        }
    }

    /// Identity of a thumbnail preview session for `camera`.
    ///
    /// The nonce keeps concurrent previews of the same camera distinct.
    #[must_use]
    pub fn preview(camera: &CameraName, nonce: &str) -> Self {
        Self {
            role: ParticipantRole::Preview,
            name: format!("{}-{nonce}", camera.as_str()),
        }
    }

    /// Parse the identity string reported by the media session.
    ///
    /// The preview prefix is checked before the viewer prefix since it is
    /// the more specific one.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if let Some(name) = raw.strip_prefix(PREVIEW_PREFIX) {
            Self {
                role: ParticipantRole::Preview,
                name: name.to_string(),
            }
        } else if let Some(name) = raw.strip_prefix(CAMERA_PREFIX) {
            Self::camera(name)
        } else if let Some(name) = raw.strip_prefix(VIEWER_PREFIX) {
            Self::viewer(name)
        } else {
            Self {
                role: ParticipantRole::Other,
                name: raw.to_string(),
            }
        }
    }

    /// Participant role.
    #[must_use]
    pub fn role(&self) -> ParticipantRole {
        self.role
    }

    /// Bare name without the role prefix.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this is a camera participant.
    #[must_use]
    pub fn is_camera(&self) -> bool {
        self.role == ParticipantRole::Camera
    }

    /// Whether this is a full viewer participant.
    #[must_use]
    pub fn is_viewer(&self) -> bool {
        self.role == ParticipantRole::Viewer
    }

    /// The named camera behind this identity, if it is a camera.
    #[must_use]
    pub fn camera_name(&self) -> Option<CameraName> {
        self.is_camera().then(|| CameraName::new(self.name.clone()))
    }

    /// Canonical identity string as used on the wire.
    #[must_use]
    pub fn as_wire(&self) -> String {
        match self.role {
            ParticipantRole::Camera => format!("{CAMERA_PREFIX}{}", self.name),
            ParticipantRole::Viewer => format!("{VIEWER_PREFIX}{}", self.name),
            ParticipantRole::Preview => format!("{PREVIEW_PREFIX}{}", self.name),
            ParticipantRole::Other => self.name.clone(),
        }
    }
}

impl fmt::Display for ParticipantIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_wire())
    }
}

impl Serialize for ParticipantIdentity {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_wire())
    }
}

impl<'de> Deserialize<'de> for ParticipantIdentity {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// Server-assigned identifier of a track publication.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackSid(pub String);

impl TrackSid {
    /// Create a track SID.
    #[must_use]
    pub fn new(sid: impl Into<String>) -> Self {
        Self(sid.into())
    }
}

impl fmt::Display for TrackSid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of a published track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

impl TrackKind {
    /// Returns the kind as a string for logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            TrackKind::Audio => "audio",
            TrackKind::Video => "video",
        }
    }
}
