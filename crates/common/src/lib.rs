//! Common types and clients shared across the monitor components.

#![warn(clippy::pedantic)]

/// Module for common error types
pub mod error;

/// Module for room, camera and participant identity types
pub mod types;

/// Module for common configuration
pub mod config;

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for the signed-in identity session
pub mod identity;

/// Module for media access token acquisition
pub mod media_token;

/// Module for the backend REST client
pub mod api;

/// Module for the media session capability
pub mod media;

/// Module for the signaling channel capability
pub mod signaling;

/// Module for the local audio playback capability
pub mod audio;
