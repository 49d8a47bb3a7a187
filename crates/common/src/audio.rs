//! Local audio playback capability (the camera device's speaker).

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

/// Playback failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AudioError {
    #[error("Playback failed: {0}")]
    Playback(String),
}

/// Asynchronous playback notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// The clip played to the end.
    Ended,
    /// Playback failed after it started.
    Error(String),
}

/// Audio output that can play a clip by URL.
#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Load `url` and start playing it, replacing any current clip.
    async fn play(&self, url: &str) -> Result<(), AudioError>;

    /// Pause and rewind to the start.
    async fn stop(&self);

    fn events(&self) -> broadcast::Receiver<PlaybackEvent>;
}
