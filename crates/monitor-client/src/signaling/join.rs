//! Re-join the room on every signaling connect.
//!
//! A reconnect invalidates the server's room bookkeeping, so each connect
//! generation gets exactly one `join-room`, built from the identity current
//! at that moment. Without a signed-in user the join waits for a sign-in.

use crate::signaling::commands::{JoinRoom, OutboundCommand};
use crate::signaling::hub::{JoinTracker, SignalingHub};

use common::identity::IdentityHandle;
use common::types::{CameraName, RoomId};
use std::sync::Arc;
use tracing::{info, warn};

/// Who is joining.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinAs {
    Camera { room: RoomId, camera: CameraName },
    Viewer { room: RoomId },
}

impl JoinAs {
    fn command(&self, uid: String) -> OutboundCommand {
        OutboundCommand::JoinRoom(match self {
            JoinAs::Camera { room, camera } => JoinRoom::camera(room, camera, uid),
            JoinAs::Viewer { room } => JoinRoom::viewer(room, uid),
        })
    }

    fn role(&self) -> &'static str {
        match self {
            JoinAs::Camera { .. } => "camera",
            JoinAs::Viewer { .. } => "viewer",
        }
    }
}

pub struct RoomJoiner {
    hub: Arc<SignalingHub>,
    tracker: JoinTracker,
    identity: IdentityHandle,
    identity_open: bool,
    join_as: JoinAs,
}

impl RoomJoiner {
    #[must_use]
    pub fn new(hub: Arc<SignalingHub>, identity: IdentityHandle, join_as: JoinAs) -> Self {
        Self {
            tracker: hub.join_tracker(),
            hub,
            identity,
            identity_open: true,
            join_as,
        }
    }

    /// Emit `join-room` if the current connect has not been joined yet.
    ///
    /// Returns the joined generation.
    pub fn join_if_pending(&mut self) -> Option<u64> {
        let generation = self.tracker.pending()?;

        let Some(uid) = self.identity.uid() else {
            warn!(
                target: "monitor.signaling.join",
                role = self.join_as.role(),
                generation,
                "No signed-in user, join deferred"
            );
            return None;
        };

        // Marked even on failure: a failed emit means this connect is gone.
        self.tracker.mark_joined(generation);
        match self.hub.emit_on(generation, &self.join_as.command(uid)) {
            Ok(()) => {
                info!(
                    target: "monitor.signaling.join",
                    role = self.join_as.role(),
                    generation,
                    "Joined room"
                );
                Some(generation)
            }
            Err(e) => {
                warn!(
                    target: "monitor.signaling.join",
                    role = self.join_as.role(),
                    generation,
                    error = %e,
                    "Join failed"
                );
                None
            }
        }
    }

    /// Wait for a connection or identity change.
    ///
    /// Returns `false` once the hub has stopped. Cancel safe.
    pub async fn changed(&mut self) -> bool {
        tokio::select! {
            alive = self.tracker.changed() => alive,
            open = self.identity.changed(), if self.identity_open => {
                self.identity_open = open;
                true
            }
        }
    }
}
