//! Recording audio output for camera-side relay tests.

use async_trait::async_trait;
use common::audio::{AudioError, AudioOutput, PlaybackEvent};
use std::sync::Mutex;
use tokio::sync::broadcast;

/// A recorded playback call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioCall {
    Play(String),
    Stop,
}

/// Audio output that records calls instead of playing anything.
#[derive(Debug)]
pub struct RecordingAudioOutput {
    calls: Mutex<Vec<AudioCall>>,
    fail_next_play: Mutex<Option<String>>,
    events: broadcast::Sender<PlaybackEvent>,
}

impl Default for RecordingAudioOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingAudioOutput {
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            calls: Mutex::new(Vec::new()),
            fail_next_play: Mutex::new(None),
            events,
        }
    }

    #[must_use]
    pub fn calls(&self) -> Vec<AudioCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Make the next `play` fail immediately.
    pub fn fail_next_play(&self, message: &str) {
        *self.fail_next_play.lock().unwrap() = Some(message.to_string());
    }

    /// The current clip played to the end.
    pub fn finish(&self) {
        let _ = self.events.send(PlaybackEvent::Ended);
    }

    /// The current clip failed mid-playback.
    pub fn error(&self, message: &str) {
        let _ = self.events.send(PlaybackEvent::Error(message.to_string()));
    }
}

#[async_trait]
impl AudioOutput for RecordingAudioOutput {
    async fn play(&self, url: &str) -> Result<(), AudioError> {
        self.calls
            .lock()
            .unwrap()
            .push(AudioCall::Play(url.to_string()));
        match self.fail_next_play.lock().unwrap().take() {
            Some(message) => Err(AudioError::Playback(message)),
            None => Ok(()),
        }
    }

    async fn stop(&self) {
        self.calls.lock().unwrap().push(AudioCall::Stop);
    }

    fn events(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }
}
