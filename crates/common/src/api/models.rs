//! Backend resource types.
//!
//! Field names follow the backend's JSON (`_id`, `UID`, camelCase settings).

use crate::types::{CameraName, ParticipantIdentity, RoomId};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Camera status as last reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CameraStatus {
    #[serde(rename = "ONLINE")]
    Online,
    #[serde(rename = "OFFLINE")]
    Offline,
}

impl CameraStatus {
    /// Whether the camera is live.
    #[must_use]
    pub fn is_online(self) -> bool {
        self == CameraStatus::Online
    }
}

/// A camera registered in a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraRecord {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: CameraName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<CameraStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

/// A group member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMember {
    #[serde(rename = "UID")]
    pub uid: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Membership wrapper as nested by the backend (`users: [{ user: {...} }]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMembership {
    pub user: GroupMember,
}

/// A monitoring group. Its ID doubles as the media/signaling room ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub cameras: Vec<CameraRecord>,
    #[serde(default)]
    pub users: Vec<GroupMembership>,
}

impl Group {
    /// Room this group's sessions run in.
    #[must_use]
    pub fn room_id(&self) -> RoomId {
        RoomId::new(self.id.clone())
    }

    /// Group members, unwrapped.
    #[must_use]
    pub fn members(&self) -> Vec<GroupMember> {
        self.users.iter().map(|m| m.user.clone()).collect()
    }
}

/// Per-group detection and recording settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSettings {
    #[serde(default)]
    pub cry_detection: bool,
    #[serde(default)]
    pub audio_video_recording: bool,
    #[serde(default)]
    pub motion_detection: bool,
}

/// Per-user preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    #[serde(default = "default_true")]
    pub allow_notifications: bool,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            allow_notifications: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// An event detected by a camera (cry, motion, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraEvent {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(flatten)]
    pub details: BTreeMap<String, serde_json::Value>,
}

/// An audio clip that viewers can play on a camera.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioAsset {
    /// Storage key, `audio/<room>/<file>`.
    pub key: String,
    /// Playable URL sent in `play-audio`.
    #[serde(default)]
    pub url: Option<String>,
}

impl AudioAsset {
    /// Human readable name: the key without room prefix and extension.
    #[must_use]
    pub fn display_name(&self, room: &RoomId) -> String {
        let prefix = format!("audio/{}/", room.as_str());
        let file = self.key.strip_prefix(&prefix).unwrap_or(&self.key);
        match file.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.contains('/') => stem.to_string(),
            _ => file.to_string(),
        }
    }
}

/// A stored recording segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recording {
    pub key: String,
    pub playlist_url: String,
    /// `YYYY-MM-DD`.
    pub date: String,
    /// `hh_mm_ss`.
    pub time: String,
    #[serde(default)]
    pub duration: Option<f64>,
}

impl Recording {
    /// Start of the recording, if `date`/`time` parse.
    #[must_use]
    pub fn started_at(&self) -> Option<NaiveDateTime> {
        let date = NaiveDate::parse_from_str(&self.date, "%Y-%m-%d").ok()?;
        let time = NaiveTime::parse_from_str(&self.time, "%H_%M_%S").ok()?;
        Some(date.and_time(time))
    }
}

/// Recordings of one camera participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantRecordings {
    pub participant: ParticipantIdentity,
    #[serde(default)]
    pub recordings: Vec<Recording>,
}

impl ParticipantRecordings {
    /// Recordings bucketed by `(year, month)`, newest month first, newest
    /// recording first within a month. Unparseable dates are skipped.
    #[must_use]
    pub fn by_month(&self) -> Vec<((i32, u32), Vec<Recording>)> {
        use chrono::Datelike;

        let mut buckets: BTreeMap<(i32, u32), Vec<(NaiveDateTime, Recording)>> = BTreeMap::new();
        for rec in &self.recordings {
            if let Some(at) = rec.started_at() {
                buckets
                    .entry((at.year(), at.month()))
                    .or_default()
                    .push((at, rec.clone()));
            }
        }

        buckets
            .into_iter()
            .rev()
            .map(|(month, mut recs)| {
                recs.sort_by(|a, b| b.0.cmp(&a.0));
                (month, recs.into_iter().map(|(_, r)| r).collect())
            })
            .collect()
    }
}
