//! Actor model for the monitor client.
//!
//! - `CameraPresenceActor` - one per tracked named camera (first-sight
//!   timeout, settle delay, subscription policy)
//! - `ViewerRoomActor` - full viewer: camera list, selection, speaking set,
//!   push-to-talk
//! - `CaptureRoomActor` - camera side: viewer microphones only
//! - `CameraRelayActor` - camera side of the control-command relay
//! - `ViewerControl` - viewer side of the control-command relay
//!
//! Every actor owns its state exclusively and is driven by a
//! `tokio::select!` over its cancellation token, its event receivers and its
//! timer deadlines. Dropping a handle detaches its actor.

pub mod camera_relay;
pub mod capture_room;
pub mod presence;
pub mod viewer_control;
pub mod viewer_room;

pub use camera_relay::{CameraRelayActor, CameraRelayHandle, CaptureConfig, RelayStatus};
pub use capture_room::{CaptureRoomActor, CaptureRoomHandle, CaptureRoomState};
pub use presence::{
    CameraPresenceActor, CameraPresenceHandle, OfflineReason, PresenceChange, PresenceSignal,
    PresenceState,
};
pub use viewer_control::ViewerControl;
pub use viewer_room::{ViewerRoomActor, ViewerRoomHandle, ViewerRoomState};
