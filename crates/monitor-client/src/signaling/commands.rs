//! Control commands exchanged over the signaling channel.
//!
//! | Event | Sent payload | Received payload |
//! |---|---|---|
//! | `join-room` | `{group, role, cameraIdentity?, groupId, UID, baby?}` | - |
//! | `camera-disconnect` | `{groupId, cameraName}` | - |
//! | `play-audio` | `{group, cameraIdentity, audioUrl}` | `{audioUrl}` |
//! | `stop-audio` | `{group, cameraIdentity}` | none |
//! | `rotate-camera` | `{group, cameraIdentity}` | none |
//!
//! `cameraIdentity` is the bare camera name, not the participant identity.

use common::signaling::{SignalingError, SignalingFrame};
use common::types::{CameraName, RoomId};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const JOIN_ROOM: &str = "join-room";
pub const CAMERA_DISCONNECT: &str = "camera-disconnect";
pub const PLAY_AUDIO: &str = "play-audio";
pub const STOP_AUDIO: &str = "stop-audio";
pub const ROTATE_CAMERA: &str = "rotate-camera";

/// Role announced in `join-room`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinRole {
    Camera,
    Viewer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRoom {
    pub group: String,
    pub role: JoinRole,
    #[serde(rename = "cameraIdentity", skip_serializing_if = "Option::is_none")]
    pub camera_identity: Option<String>,
    #[serde(rename = "groupId")]
    pub group_id: String,
    #[serde(rename = "UID")]
    pub uid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baby: Option<String>,
}

impl JoinRoom {
    /// Camera-side join: the camera announces itself by name.
    #[must_use]
    pub fn camera(room: &RoomId, camera: &CameraName, uid: impl Into<String>) -> Self {
        Self {
            group: room.to_string(),
            role: JoinRole::Camera,
            camera_identity: Some(camera.to_string()),
            group_id: room.to_string(),
            uid: uid.into(),
            baby: Some(camera.to_string()),
        }
    }

    #[must_use]
    pub fn viewer(room: &RoomId, uid: impl Into<String>) -> Self {
        Self {
            group: room.to_string(),
            role: JoinRole::Viewer,
            camera_identity: None,
            group_id: room.to_string(),
            uid: uid.into(),
            baby: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraDisconnect {
    #[serde(rename = "groupId")]
    pub group_id: String,
    #[serde(rename = "cameraName")]
    pub camera_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayAudio {
    pub group: String,
    #[serde(rename = "cameraIdentity")]
    pub camera_identity: String,
    #[serde(rename = "audioUrl")]
    pub audio_url: String,
}

/// Payload of commands that only name their target camera.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetCamera {
    pub group: String,
    #[serde(rename = "cameraIdentity")]
    pub camera_identity: String,
}

impl TargetCamera {
    #[must_use]
    pub fn new(room: &RoomId, camera: &CameraName) -> Self {
        Self {
            group: room.to_string(),
            camera_identity: camera.to_string(),
        }
    }
}

/// A command this client sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundCommand {
    JoinRoom(JoinRoom),
    CameraDisconnect(CameraDisconnect),
    PlayAudio(PlayAudio),
    StopAudio(TargetCamera),
    RotateCamera(TargetCamera),
}

impl OutboundCommand {
    #[must_use]
    pub fn camera_disconnect(room: &RoomId, camera: &CameraName) -> Self {
        OutboundCommand::CameraDisconnect(CameraDisconnect {
            group_id: room.to_string(),
            camera_name: camera.to_string(),
        })
    }

    #[must_use]
    pub fn play_audio(room: &RoomId, camera: &CameraName, audio_url: impl Into<String>) -> Self {
        OutboundCommand::PlayAudio(PlayAudio {
            group: room.to_string(),
            camera_identity: camera.to_string(),
            audio_url: audio_url.into(),
        })
    }

    #[must_use]
    pub fn stop_audio(room: &RoomId, camera: &CameraName) -> Self {
        OutboundCommand::StopAudio(TargetCamera::new(room, camera))
    }

    #[must_use]
    pub fn rotate_camera(room: &RoomId, camera: &CameraName) -> Self {
        OutboundCommand::RotateCamera(TargetCamera::new(room, camera))
    }

    /// Wire event name.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            OutboundCommand::JoinRoom(_) => JOIN_ROOM,
            OutboundCommand::CameraDisconnect(_) => CAMERA_DISCONNECT,
            OutboundCommand::PlayAudio(_) => PLAY_AUDIO,
            OutboundCommand::StopAudio(_) => STOP_AUDIO,
            OutboundCommand::RotateCamera(_) => ROTATE_CAMERA,
        }
    }

    /// Encode as a signaling frame.
    ///
    /// # Errors
    ///
    /// `SignalingError::Encode` if the payload cannot be serialized.
    pub fn to_frame(&self) -> Result<SignalingFrame, SignalingError> {
        let data = match self {
            OutboundCommand::JoinRoom(p) => serde_json::to_value(p)?,
            OutboundCommand::CameraDisconnect(p) => serde_json::to_value(p)?,
            OutboundCommand::PlayAudio(p) => serde_json::to_value(p)?,
            OutboundCommand::StopAudio(p) | OutboundCommand::RotateCamera(p) => {
                serde_json::to_value(p)?
            }
        };
        Ok(SignalingFrame::new(self.event_name(), data))
    }
}

#[derive(Deserialize)]
struct ReceivedPlayAudio {
    #[serde(rename = "audioUrl")]
    audio_url: String,
}

/// A command delivered to a camera.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundCommand {
    PlayAudio { audio_url: String },
    StopAudio,
    RotateCamera,
}

impl InboundCommand {
    /// Decode a received frame.
    ///
    /// Returns `Ok(None)` for events that are not camera commands.
    ///
    /// # Errors
    ///
    /// `SignalingError::Encode` if a known command carries a malformed
    /// payload.
    pub fn from_frame(frame: &SignalingFrame) -> Result<Option<Self>, SignalingError> {
        match frame.event.as_str() {
            PLAY_AUDIO => {
                let payload: ReceivedPlayAudio = serde_json::from_value(frame.data.clone())?;
                if payload.audio_url.trim().is_empty() {
                    return Err(SignalingError::Encode("empty audioUrl".to_string()));
                }
                Ok(Some(InboundCommand::PlayAudio {
                    audio_url: payload.audio_url,
                }))
            }
            STOP_AUDIO => Ok(Some(InboundCommand::StopAudio)),
            ROTATE_CAMERA => Ok(Some(InboundCommand::RotateCamera)),
            other => {
                debug!(target: "monitor.signaling", event = other, "Ignoring signaling event");
                Ok(None)
            }
        }
    }

    /// Decode a received frame, logging and dropping anything unusable.
    #[must_use]
    pub fn decode(frame: &SignalingFrame) -> Option<Self> {
        match Self::from_frame(frame) {
            Ok(command) => command,
            Err(e) => {
                warn!(
                    target: "monitor.signaling",
                    event = %frame.event,
                    error = %e,
                    "Dropping malformed command"
                );
                None
            }
        }
    }

    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            InboundCommand::PlayAudio { .. } => PLAY_AUDIO,
            InboundCommand::StopAudio => STOP_AUDIO,
            InboundCommand::RotateCamera => ROTATE_CAMERA,
        }
    }
}
