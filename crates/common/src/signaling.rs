//! Signaling channel capability.
//!
//! A bidirectional channel of named events. Every frame on the wire is a JSON
//! object `{"event": <name>, "data": <payload>}`. A [`SignalingTransport`]
//! opens [`SignalingConnection`]s; reconnecting is the caller's job.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors on the signaling channel.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignalingError {
    /// The channel is not connected right now.
    #[error("Signaling channel not connected")]
    NotConnected,

    /// Transport failure (connect, read or write).
    #[error("Signaling transport error: {0}")]
    Transport(String),

    /// A frame could not be encoded or decoded.
    #[error("Signaling encode error: {0}")]
    Encode(String),

    /// The channel was shut down by its owner.
    #[error("Signaling channel closed")]
    Closed,
}

impl From<serde_json::Error> for SignalingError {
    fn from(err: serde_json::Error) -> Self {
        SignalingError::Encode(err.to_string())
    }
}

/// One named event with its payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalingFrame {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl SignalingFrame {
    #[must_use]
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Parse a text frame.
    ///
    /// # Errors
    ///
    /// `SignalingError::Encode` if the text is not a frame object.
    pub fn from_text(text: &str) -> Result<Self, SignalingError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Render as a text frame.
    ///
    /// # Errors
    ///
    /// `SignalingError::Encode` if the payload cannot be serialized.
    pub fn to_text(&self) -> Result<String, SignalingError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// An open signaling connection.
///
/// `recv` must be cancel safe: it is raced against outbound traffic and
/// shutdown.
#[async_trait]
pub trait SignalingConnection: Send {
    async fn send(&mut self, frame: SignalingFrame) -> Result<(), SignalingError>;

    /// Next inbound frame. `None` once the peer closed the connection.
    async fn recv(&mut self) -> Option<Result<SignalingFrame, SignalingError>>;

    /// Close the connection. Errors are ignored.
    async fn close(&mut self);
}

/// Opens signaling connections.
#[async_trait]
pub trait SignalingTransport: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn SignalingConnection>, SignalingError>;
}
