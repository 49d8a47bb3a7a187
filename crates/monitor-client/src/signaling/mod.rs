//! Control-command relay plumbing.
//!
//! - `commands` - typed control commands and their wire payloads
//! - `hub` - the one process-wide signaling connection
//! - `join` - one `join-room` per connect
//! - `ws` - WebSocket transport

pub mod commands;
pub mod hub;
pub mod join;
pub mod ws;

pub use commands::{InboundCommand, JoinRole, OutboundCommand};
pub use hub::{ConnectionState, SignalingEvent, SignalingHub};
pub use join::{JoinAs, RoomJoiner};
pub use ws::WebSocketTransport;
