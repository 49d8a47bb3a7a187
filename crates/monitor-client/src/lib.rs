//! Monitor Client Library
//!
//! Client-side session coordination for the baby monitor:
//!
//! - Room membership: which remote participants are named cameras, which of
//!   their tracks to subscribe, and when a camera counts as offline
//! - Control commands over the signaling side channel: join on every
//!   connect, relayed audio playback, camera rotation
//! - Preview, full viewer and capture views built on top of both
//!
//! # Architecture
//!
//! ```text
//! SignalingHub (one per process, Arc)
//! ├── CameraRelayActor (capture side)
//! └── ViewerControl    (viewer side)
//!
//! PreviewSession / ViewerSession / CaptureSession (one media session each)
//! ├── CameraPresenceActor (per tracked camera)
//! ├── ViewerRoomActor     (full viewer)
//! └── CaptureRoomActor    (capture)
//! ```
//!
//! # Modules
//!
//! - [`actors`] - Room membership and command relay actors
//! - [`signaling`] - Signaling hub, command codec, WebSocket transport
//! - [`sessions`] - Preview, viewer and capture views
//! - [`policy`] - Selective subscription policies
//! - [`status_board`] - Polled vs observed camera status, fed by previews
//! - [`config`] - Client configuration from environment
//! - [`errors`] - Error types with client-safe messages

pub mod actors;
pub mod config;
pub mod errors;
pub mod observability;
pub mod policy;
pub mod sessions;
pub mod signaling;
pub mod status_board;
