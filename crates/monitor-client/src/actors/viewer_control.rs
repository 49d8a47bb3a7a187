//! `ViewerControl` - viewer-side sender of camera commands.
//!
//! Joins the room as `viewer` on every signaling connect (a small background
//! task) and sends `play-audio`, `stop-audio` and `rotate-camera` to a named
//! camera. Commands are fire-and-forget: they are only sent while the
//! channel is connected.

use crate::errors::SessionError;
use crate::signaling::commands::OutboundCommand;
use crate::signaling::hub::SignalingHub;
use crate::signaling::join::{JoinAs, RoomJoiner};

use common::identity::IdentityHandle;
use common::types::{CameraName, RoomId};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, instrument};

/// Viewer-side command sender. Dropping it stops re-joining.
pub struct ViewerControl {
    room: RoomId,
    hub: Arc<SignalingHub>,
    cancel_token: CancellationToken,
    _detach_on_drop: DropGuard,
}

impl ViewerControl {
    /// Start joining `room` as a viewer.
    pub fn start(
        room: RoomId,
        hub: Arc<SignalingHub>,
        identity: IdentityHandle,
        cancel_token: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let joiner = RoomJoiner::new(hub.clone(), identity, JoinAs::Viewer { room: room.clone() });
        let task = tokio::spawn(join_loop(room.clone(), joiner, cancel_token.clone()));

        let control = Self {
            room,
            hub,
            _detach_on_drop: cancel_token.clone().drop_guard(),
            cancel_token,
        };
        (control, task)
    }

    #[must_use]
    pub fn room(&self) -> &RoomId {
        &self.room
    }

    /// Ask `camera` to play the clip at `audio_url`.
    ///
    /// # Errors
    ///
    /// - `SessionError::Validation` - empty camera name or URL
    /// - `SessionError::Signaling` - channel not connected or closed
    pub fn play_audio(&self, camera: &CameraName, audio_url: &str) -> Result<(), SessionError> {
        let audio_url = audio_url.trim();
        if audio_url.is_empty() {
            return Err(SessionError::Validation("Choose an audio to play".to_string()));
        }
        self.send(camera, OutboundCommand::play_audio(&self.room, camera, audio_url))
    }

    /// Ask `camera` to stop and rewind relayed audio.
    ///
    /// # Errors
    ///
    /// As [`ViewerControl::play_audio`].
    pub fn stop_audio(&self, camera: &CameraName) -> Result<(), SessionError> {
        self.send(camera, OutboundCommand::stop_audio(&self.room, camera))
    }

    /// Ask `camera` to switch between front and back.
    ///
    /// # Errors
    ///
    /// As [`ViewerControl::play_audio`].
    pub fn rotate_camera(&self, camera: &CameraName) -> Result<(), SessionError> {
        self.send(camera, OutboundCommand::rotate_camera(&self.room, camera))
    }

    /// Stop re-joining.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    fn send(&self, camera: &CameraName, command: OutboundCommand) -> Result<(), SessionError> {
        if camera.as_str().trim().is_empty() {
            return Err(SessionError::Validation("Choose a camera".to_string()));
        }
        self.hub.emit(&command)?;
        debug!(
            target: "monitor.relay.viewer",
            camera = %camera,
            event = command.event_name(),
            "Command sent"
        );
        Ok(())
    }
}

#[instrument(skip_all, name = "monitor.relay.viewer", fields(room = %room))]
async fn join_loop(room: RoomId, mut joiner: RoomJoiner, cancel_token: CancellationToken) {
    joiner.join_if_pending();

    loop {
        tokio::select! {
            biased;
            () = cancel_token.cancelled() => break,
            alive = joiner.changed() => {
                if !alive {
                    break;
                }
                joiner.join_if_pending();
            }
        }
    }

    info!(target: "monitor.relay.viewer", room = %room, "Viewer relay stopped");
}
