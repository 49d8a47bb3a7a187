//! `CameraRelayActor` - camera-side receiver of control commands.
//!
//! The actor:
//! - Joins the room as `camera` on every signaling connect
//! - Plays and stops relayed audio on the device's [`AudioOutput`]
//! - Toggles the capture facing mode on `rotate-camera`, bumping the capture
//!   session key so the capture view reconnects its media session
//! - On teardown, emits `camera-disconnect` before dropping its listeners
//!
//! Its hub subscription is a broadcast receiver owned by the actor, so
//! listeners are released exactly when the actor exits.

use crate::signaling::commands::{InboundCommand, OutboundCommand};
use crate::signaling::hub::{SignalingEvent, SignalingHub};
use crate::signaling::join::{JoinAs, RoomJoiner};

use common::audio::{AudioOutput, PlaybackEvent};
use common::identity::IdentityHandle;
use common::media::FacingMode;
use common::types::{CameraName, RoomId};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, instrument, warn};

/// Capture constraints. A new `session_key` means a fresh media session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CaptureConfig {
    pub facing_mode: FacingMode,
    pub session_key: u64,
}

impl CaptureConfig {
    #[must_use]
    pub fn rotated(self) -> Self {
        Self {
            facing_mode: self.facing_mode.toggled(),
            session_key: self.session_key.wrapping_add(1),
        }
    }
}

/// What the relay is doing right now.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayStatus {
    /// Relayed clip currently playing.
    pub audio_url: Option<String>,
    /// Last playback failure.
    pub last_error: Option<String>,
    /// Connect generation of the last successful join.
    pub joined_generation: Option<u64>,
}

/// Handle to a `CameraRelayActor`.
///
/// Dropping the handle tears the relay down.
pub struct CameraRelayHandle {
    status: watch::Receiver<RelayStatus>,
    capture: watch::Receiver<CaptureConfig>,
    cancel_token: CancellationToken,
    _detach_on_drop: DropGuard,
}

impl CameraRelayHandle {
    #[must_use]
    pub fn status(&self) -> RelayStatus {
        self.status.borrow().clone()
    }

    #[must_use]
    pub fn subscribe_status(&self) -> watch::Receiver<RelayStatus> {
        self.status.clone()
    }

    #[must_use]
    pub fn capture_config(&self) -> CaptureConfig {
        *self.capture.borrow()
    }

    /// Watch capture constraint changes.
    #[must_use]
    pub fn subscribe_capture(&self) -> watch::Receiver<CaptureConfig> {
        self.capture.clone()
    }

    /// Tear down: `camera-disconnect` is emitted, then listeners are released.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

/// The `CameraRelayActor` implementation.
pub struct CameraRelayActor {
    room: RoomId,
    camera: CameraName,
    hub: Arc<SignalingHub>,
    joiner: RoomJoiner,
    audio: Arc<dyn AudioOutput>,
    status: watch::Sender<RelayStatus>,
    capture: watch::Sender<CaptureConfig>,
    cancel_token: CancellationToken,
}

impl CameraRelayActor {
    /// Spawn the relay for `camera` in `room`.
    pub fn spawn(
        room: RoomId,
        camera: CameraName,
        hub: Arc<SignalingHub>,
        identity: IdentityHandle,
        audio: Arc<dyn AudioOutput>,
        cancel_token: CancellationToken,
    ) -> (CameraRelayHandle, JoinHandle<()>) {
        let (status_tx, status_rx) = watch::channel(RelayStatus::default());
        let (capture_tx, capture_rx) = watch::channel(CaptureConfig::default());

        let joiner = RoomJoiner::new(
            hub.clone(),
            identity,
            JoinAs::Camera {
                room: room.clone(),
                camera: camera.clone(),
            },
        );

        let actor = Self {
            room,
            camera,
            hub,
            joiner,
            audio,
            status: status_tx,
            capture: capture_tx,
            cancel_token: cancel_token.clone(),
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = CameraRelayHandle {
            status: status_rx,
            capture: capture_rx,
            _detach_on_drop: cancel_token.clone().drop_guard(),
            cancel_token,
        };

        (handle, task_handle)
    }

    #[instrument(skip_all, name = "monitor.relay.camera", fields(room = %self.room, camera = %self.camera))]
    async fn run(mut self) {
        info!(
            target: "monitor.relay.camera",
            room = %self.room,
            camera = %self.camera,
            "Camera relay started"
        );

        let mut commands = self.hub.subscribe();
        let mut playback = self.audio.events();
        let mut playback_open = true;

        self.join_if_pending();

        loop {
            tokio::select! {
                biased;

                () = self.cancel_token.cancelled() => {
                    self.leave();
                    break;
                }

                alive = self.joiner.changed() => {
                    if !alive {
                        debug!(
                            target: "monitor.relay.camera",
                            camera = %self.camera,
                            "Signaling hub stopped"
                        );
                        break;
                    }
                    self.join_if_pending();
                }

                event = commands.recv() => {
                    match event {
                        Ok(SignalingEvent::Command(command)) => self.handle_command(command).await,
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(
                                target: "monitor.relay.camera",
                                camera = %self.camera,
                                skipped,
                                "Commands lagged"
                            );
                        }
                        Err(RecvError::Closed) => break,
                    }
                }

                event = playback.recv(), if playback_open => {
                    match event {
                        Ok(event) => self.handle_playback(event),
                        Err(RecvError::Lagged(_)) => {}
                        Err(RecvError::Closed) => playback_open = false,
                    }
                }
            }
        }

        // Listeners go with the receivers.
        drop(commands);
        drop(playback);

        info!(
            target: "monitor.relay.camera",
            camera = %self.camera,
            "Camera relay stopped"
        );
    }

    fn join_if_pending(&mut self) {
        if let Some(generation) = self.joiner.join_if_pending() {
            self.status
                .send_modify(|status| status.joined_generation = Some(generation));
        }
    }

    async fn handle_command(&mut self, command: InboundCommand) {
        match command {
            InboundCommand::PlayAudio { audio_url } => {
                info!(
                    target: "monitor.relay.camera",
                    camera = %self.camera,
                    url = %audio_url,
                    "Playing relayed audio"
                );
                match self.audio.play(&audio_url).await {
                    Ok(()) => self.status.send_modify(|status| {
                        status.audio_url = Some(audio_url);
                        status.last_error = None;
                    }),
                    Err(e) => {
                        warn!(
                            target: "monitor.relay.camera",
                            camera = %self.camera,
                            error = %e,
                            "Relayed audio failed to start"
                        );
                        self.status.send_modify(|status| {
                            status.audio_url = None;
                            status.last_error = Some(e.to_string());
                        });
                    }
                }
            }
            InboundCommand::StopAudio => {
                info!(
                    target: "monitor.relay.camera",
                    camera = %self.camera,
                    "Stopping relayed audio"
                );
                self.audio.stop().await;
                self.status.send_modify(|status| status.audio_url = None);
            }
            InboundCommand::RotateCamera => {
                let config = self.capture.borrow().rotated();
                info!(
                    target: "monitor.relay.camera",
                    camera = %self.camera,
                    facing_mode = config.facing_mode.as_str(),
                    session_key = config.session_key,
                    "Rotating camera"
                );
                self.capture.send_replace(config);
            }
        }
    }

    fn handle_playback(&mut self, event: PlaybackEvent) {
        match event {
            PlaybackEvent::Ended => {
                debug!(target: "monitor.relay.camera", camera = %self.camera, "Relayed audio ended");
                self.status.send_modify(|status| status.audio_url = None);
            }
            PlaybackEvent::Error(message) => {
                warn!(
                    target: "monitor.relay.camera",
                    camera = %self.camera,
                    error = %message,
                    "Relayed audio playback error"
                );
                self.status.send_modify(|status| {
                    status.audio_url = None;
                    status.last_error = Some(message);
                });
            }
        }
    }

    fn leave(&self) {
        match self
            .hub
            .emit(&OutboundCommand::camera_disconnect(&self.room, &self.camera))
        {
            Ok(()) => {
                debug!(target: "monitor.relay.camera", camera = %self.camera, "Sent camera-disconnect");
            }
            Err(e) => {
                warn!(
                    target: "monitor.relay.camera",
                    camera = %self.camera,
                    error = %e,
                    "camera-disconnect not sent"
                );
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::ReconnectPolicy;
    use common::signaling::SignalingFrame;
    use monitor_test_utils::{
        test_identity, test_room, AudioCall, MockSignalingServer, RecordingAudioOutput,
    };
    use serde_json::json;
    use std::time::Duration;

    struct Fixture {
        server: MockSignalingServer,
        hub: Arc<SignalingHub>,
        audio: Arc<RecordingAudioOutput>,
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    fn fixture() -> Fixture {
        let server = MockSignalingServer::new();
        let hub = SignalingHub::start(
            server.transport(),
            ReconnectPolicy::default(),
            CancellationToken::new(),
        );
        Fixture {
            server,
            hub,
            audio: Arc::new(RecordingAudioOutput::new()),
        }
    }

    fn spawn_relay(f: &Fixture, camera: &str) -> (CameraRelayHandle, JoinHandle<()>) {
        CameraRelayActor::spawn(
            test_room(),
            CameraName::new(camera),
            f.hub.clone(),
            test_identity(),
            f.audio.clone(),
            CancellationToken::new(),
        )
    }

    fn command(event: &str, data: serde_json::Value) -> SignalingFrame {
        SignalingFrame::new(event, data)
    }

    #[tokio::test(start_paused = true)]
    async fn test_joins_as_camera_on_each_connect() {
        let f = fixture();
        let (handle, _task) = spawn_relay(&f, "Luna");
        settle().await;

        assert_eq!(f.server.received("join-room").len(), 1);
        assert_eq!(handle.status().joined_generation, Some(1));

        f.server.drop_connections();
        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;

        let joins = f.server.received("join-room");
        assert_eq!(joins.len(), 2);
        assert_eq!(joins[1]["role"], "camera");
        assert_eq!(joins[1]["cameraIdentity"], "Luna");
        assert_eq!(handle.status().joined_generation, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_then_stop() {
        let f = fixture();
        let (handle, _task) = spawn_relay(&f, "Luna");
        settle().await;

        f.server
            .broadcast(command("play-audio", json!({ "audioUrl": "https://x/a.mp3" })));
        settle().await;
        assert_eq!(handle.status().audio_url.as_deref(), Some("https://x/a.mp3"));

        f.server.broadcast(command("stop-audio", json!({})));
        settle().await;

        assert_eq!(
            f.audio.calls(),
            vec![AudioCall::Play("https://x/a.mp3".to_string()), AudioCall::Stop]
        );
        assert_eq!(handle.status().audio_url, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_playback_end_and_error_clear_url() {
        let f = fixture();
        let (handle, _task) = spawn_relay(&f, "Luna");
        settle().await;

        f.server
            .broadcast(command("play-audio", json!({ "audioUrl": "https://x/a.mp3" })));
        settle().await;
        f.audio.finish();
        settle().await;
        assert_eq!(handle.status().audio_url, None);

        f.server
            .broadcast(command("play-audio", json!({ "audioUrl": "https://x/b.mp3" })));
        settle().await;
        f.audio.error("decode failed");
        settle().await;

        let status = handle.status();
        assert_eq!(status.audio_url, None);
        assert_eq!(status.last_error.as_deref(), Some("decode failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_play_is_reported() {
        let f = fixture();
        let (handle, _task) = spawn_relay(&f, "Luna");
        settle().await;

        f.audio.fail_next_play("blocked by autoplay policy");
        f.server
            .broadcast(command("play-audio", json!({ "audioUrl": "https://x/a.mp3" })));
        settle().await;

        let status = handle.status();
        assert_eq!(status.audio_url, None);
        assert!(status.last_error.unwrap().contains("autoplay"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rotate_toggles_facing_mode_and_session_key() {
        let f = fixture();
        let (handle, _task) = spawn_relay(&f, "Luna");
        let mut capture = handle.subscribe_capture();
        settle().await;

        f.server.broadcast(command("rotate-camera", serde_json::Value::Null));
        settle().await;
        assert!(capture.has_changed().unwrap());
        let config = *capture.borrow_and_update();
        assert_eq!(config.facing_mode, FacingMode::Environment);
        assert_eq!(config.session_key, 1);

        f.server.broadcast(command("rotate-camera", serde_json::Value::Null));
        settle().await;
        assert_eq!(
            handle.capture_config(),
            CaptureConfig {
                facing_mode: FacingMode::User,
                session_key: 2
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_sends_camera_disconnect_before_release() {
        let f = fixture();
        let (handle, task) = spawn_relay(&f, "Luna");
        settle().await;

        drop(handle);
        task.await.unwrap();
        settle().await;

        assert_eq!(
            f.server.received("camera-disconnect"),
            vec![json!({ "groupId": "group-1", "cameraName": "Luna" })]
        );

        // Listeners released: later commands reach nobody.
        f.server
            .broadcast(command("play-audio", json!({ "audioUrl": "https://x/a.mp3" })));
        settle().await;
        assert!(f.audio.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_remount_does_not_double_handle() {
        let f = fixture();
        let (first, first_task) = spawn_relay(&f, "Luna");
        settle().await;
        first.cancel();
        first_task.await.unwrap();

        let (_second, _task) = spawn_relay(&f, "Luna");
        settle().await;
        f.server
            .broadcast(command("play-audio", json!({ "audioUrl": "https://x/a.mp3" })));
        settle().await;

        assert_eq!(f.audio.calls().len(), 1);
    }
}
