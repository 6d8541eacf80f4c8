//! The `client` module defines the representation of an observer connection.
//!
//! It provides the `Connection` struct, which holds the authenticated identity
//! of a single WebSocket session, the topics it joined, and the `FrameSink`
//! used to push frames to it.

pub mod connection;
pub mod sink;

pub use connection::{Connection, ConnectionId, ConnectionState};
pub use sink::FrameSink;

#[cfg(test)]
mod tests;
