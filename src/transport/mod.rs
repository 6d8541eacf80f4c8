//! The `transport` module is responsible for network communication with
//! observers over WebSockets.
//!
//! It defines the messaging protocol used between clients and the server,
//! and implements the WebSocket server itself: the connect-time handshake,
//! per-connection read/write loops, and the liveness heartbeat.

pub mod heartbeat;
pub mod message;
pub mod websocket;

pub use heartbeat::start_heartbeat;
pub use message::{ClientMessage, ServerMessage};
pub use websocket::{serve, start_websocket_server};
