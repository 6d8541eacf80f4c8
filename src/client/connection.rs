//! Connection representation
//!
//! `Connection` models one admitted observer. It owns the sending side of the
//! connection's outbound channel (behind `FrameSink`) and remembers which
//! topics it has joined so that cleanup and stats can be answered without a
//! scan of the topic table.

use std::sync::Arc;

use uuid::Uuid;

use crate::auth::Identity;
use crate::client::sink::FrameSink;

pub type ConnectionId = String;

/// Lifecycle of a connection as seen by the dispatcher.
///
/// A socket that has not authenticated yet has no `Connection` at all.
/// `Closed` is what the dispatcher reports for a handle after cleanup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Authenticated,
    Subscribed(String),
    Closed,
}

pub struct Connection {
    pub id: ConnectionId,
    pub identity: Identity,
    pub sink: Arc<dyn FrameSink>,
    /// Joined topic keys in subscribe order, without duplicates.
    topics: Vec<String>,
}

impl Connection {
    /// Create a connection for an authenticated identity. The `id` is a UUID
    /// used to refer to the connection across dispatcher operations.
    pub fn new(identity: Identity, sink: Arc<dyn FrameSink>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            identity,
            sink,
            topics: Vec::new(),
        }
    }

    /// The most recently joined topic still held, if any.
    pub fn subscribed_topic(&self) -> Option<&str> {
        self.topics.last().map(String::as_str)
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    pub fn state(&self) -> ConnectionState {
        match self.subscribed_topic() {
            Some(topic) => ConnectionState::Subscribed(topic.to_string()),
            None => ConnectionState::Authenticated,
        }
    }

    /// Record a joined topic. Re-joining moves it to the most recent slot.
    pub(crate) fn joined(&mut self, topic: &str) {
        self.topics.retain(|t| t != topic);
        self.topics.push(topic.to_string());
    }

    pub(crate) fn left(&mut self, topic: &str) {
        self.topics.retain(|t| t != topic);
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("identity", &self.identity)
            .field("topics", &self.topics)
            .field("open", &self.sink.is_open())
            .finish()
    }
}
