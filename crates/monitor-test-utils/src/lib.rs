//! # Monitor Test Utilities
//!
//! Mock implementations of the external capabilities the monitor client
//! depends on, plus shared fixtures.
//!
//! ## Modules
//!
//! - `mock_media` - In-memory media session and connector
//! - `mock_signaling` - In-memory signaling server with camera routing
//! - `mock_audio` - Audio output that records playback calls
//! - `mock_token` - Static media token source
//! - `fixtures` - Participants, users and rooms
//!
//! ## Usage
//!
//! ```rust,ignore
//! use monitor_test_utils::*;
//!
//! #[tokio::test(start_paused = true)]
//! async fn test_example() {
//!     let session = Arc::new(MockMediaSession::new());
//!     let server = MockSignalingServer::new();
//!
//!     session.add_participant(camera_participant("Luna"));
//!     // ... spawn actors against `session` and `server.transport()` ...
//!     assert_eq!(server.received("join-room").len(), 1);
//! }
//! ```

pub mod fixtures;
pub mod mock_audio;
pub mod mock_media;
pub mod mock_signaling;
pub mod mock_token;

// Re-export commonly used items
pub use fixtures::*;
pub use mock_audio::*;
pub use mock_media::*;
pub use mock_signaling::*;
pub use mock_token::*;
