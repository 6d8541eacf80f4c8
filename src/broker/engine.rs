//! Dispatch engine
//!
//! This module contains the in-memory pub/sub core responsible for:
//! - admitting authenticated connections and removing them on close
//! - processing subscribe/unsubscribe/ping control messages
//! - fanning published telemetry events out to a vehicle topic's members
//! - producing point-in-time stats
//!
//! Concurrency and usage notes:
//! - `Broker` is plain synchronous state: the connection registry and the
//!   topic table. It is only ever touched through `Dispatcher`, which keeps
//!   it behind a single mutex shared by every connection task and by the
//!   ingestion path.
//! - The lock is never held across network I/O. Publish copies the member
//!   sinks out under the lock and enqueues frames after releasing it; each
//!   connection's writer task performs the actual socket send.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::auth::{Identity, JwtAuthority};
use crate::broker::message::Event;
use crate::broker::registry::ConnectionRegistry;
use crate::broker::stats::{StatsReport, TopicStats};
use crate::broker::topic::{TopicTable, topic_key};
use crate::client::{Connection, ConnectionId, ConnectionState, FrameSink};
use crate::transport::message::{ClientMessage, ServerMessage};
use crate::utils::error::{
    AdmissionError, AuthenticationError, DeliveryError, ProtocolParseError,
};

type Recipient = (ConnectionId, Arc<dyn FrameSink>);

#[derive(Debug, Default)]
pub struct Broker {
    pub registry: ConnectionRegistry,
    pub topics: TopicTable,
}

impl Broker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn admit(&mut self, connection: Connection) -> ConnectionId {
        self.registry.admit(connection)
    }

    /// Remove a connection and purge it from every topic. Returns `false`
    /// when the connection was already gone.
    pub fn remove(&mut self, id: &ConnectionId) -> bool {
        let known = self.registry.remove(id).is_some();
        let left = self.topics.remove_everywhere(id);
        for topic in &left {
            debug!(conn_id = %id, topic = %topic, "Removed from topic");
        }
        known
    }

    /// Join `key`. Returns the member's identity, or `None` if the
    /// connection is no longer registered.
    pub fn subscribe(&mut self, id: &ConnectionId, key: &str) -> Option<Identity> {
        let connection = self.registry.get_mut(id)?;
        connection.joined(key);
        let identity = connection.identity.clone();
        self.topics.subscribe(id, key);
        Some(identity)
    }

    pub fn unsubscribe(&mut self, id: &ConnectionId, key: &str) -> bool {
        if let Some(connection) = self.registry.get_mut(id) {
            connection.left(key);
        }
        self.topics.unsubscribe(id, key)
    }

    /// Copy out the sinks of a topic's registered members.
    pub fn recipients(&self, key: &str) -> Vec<Recipient> {
        let Some(topic) = self.topics.get(key) else {
            return Vec::new();
        };
        topic
            .members
            .iter()
            .filter_map(|id| self.registry.get(id))
            .map(|c| (c.id.clone(), Arc::clone(&c.sink)))
            .collect()
    }

    fn sink_of(&self, id: &ConnectionId) -> Option<Arc<dyn FrameSink>> {
        self.registry.get(id).map(|c| Arc::clone(&c.sink))
    }

    pub fn report(&self) -> StatsReport {
        let mut per_topic: Vec<TopicStats> = self
            .topics
            .iter()
            .map(|topic| {
                let mut members: Vec<Identity> = topic
                    .members
                    .iter()
                    .filter_map(|id| self.registry.get(id))
                    .map(|c| c.identity.clone())
                    .collect();
                members.sort_by(|a, b| a.id.cmp(&b.id).then_with(|| a.email.cmp(&b.email)));
                TopicStats {
                    topic_key: topic.key.clone(),
                    member_count: topic.len(),
                    members,
                }
            })
            .collect();
        per_topic.sort_by(|a, b| a.topic_key.cmp(&b.topic_key));

        StatsReport {
            total_connections: self.registry.len(),
            total_topics: self.topics.topic_count(),
            per_topic,
        }
    }
}

/// Result of handing a frame to one member.
#[derive(Debug)]
pub enum DeliveryOutcome {
    Delivered,
    /// Transport no longer open; left for its own close path to clean up.
    Skipped,
    Failed(DeliveryError),
}

/// Summary of one publish call. Informational only: nothing in it is an
/// error for the caller.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub attempted: usize,
    pub delivered: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl PublishReport {
    fn from_outcomes(outcomes: &[(ConnectionId, DeliveryOutcome)]) -> Self {
        let mut report = Self::default();
        for (_, outcome) in outcomes {
            match outcome {
                DeliveryOutcome::Delivered => {
                    report.attempted += 1;
                    report.delivered += 1;
                }
                DeliveryOutcome::Failed(_) => {
                    report.attempted += 1;
                    report.failed += 1;
                }
                DeliveryOutcome::Skipped => report.skipped += 1,
            }
        }
        report
    }
}

/// Hand `frame` to every recipient independently.
pub(crate) fn fan_out(
    recipients: &[Recipient],
    frame: &WsMessage,
) -> Vec<(ConnectionId, DeliveryOutcome)> {
    recipients
        .iter()
        .map(|(id, sink)| {
            let outcome = if !sink.is_open() {
                DeliveryOutcome::Skipped
            } else {
                match sink.send(frame.clone()) {
                    Ok(()) => DeliveryOutcome::Delivered,
                    Err(e) => DeliveryOutcome::Failed(e),
                }
            };
            (id.clone(), outcome)
        })
        .collect()
}

fn encode(frame: &ServerMessage) -> Result<WsMessage, DeliveryError> {
    Ok(WsMessage::text(serde_json::to_string(frame)?))
}

/// Cloneable handle to the shared dispatch state.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    state: Arc<Mutex<Broker>>,
    authority: JwtAuthority,
    max_connections: usize,
}

impl Dispatcher {
    pub fn new(authority: JwtAuthority, max_connections: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(Broker::new())),
            authority,
            max_connections,
        }
    }

    fn state(&self) -> MutexGuard<'_, Broker> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Verify the connect-time credential once.
    pub fn authenticate(&self, token: Option<&str>) -> Result<Identity, AuthenticationError> {
        let token = token.ok_or(AuthenticationError::MissingCredential)?;
        self.authority.verify(token)
    }

    /// Authenticate a new transport and admit it, sending the welcome frame.
    pub fn connect(
        &self,
        token: Option<&str>,
        sink: Arc<dyn FrameSink>,
    ) -> Result<ConnectionId, AdmissionError> {
        let identity = self.authenticate(token)?;
        self.admit(identity, sink)
    }

    /// Register an already-authenticated transport and send the welcome frame.
    pub fn admit(
        &self,
        identity: Identity,
        sink: Arc<dyn FrameSink>,
    ) -> Result<ConnectionId, AdmissionError> {
        let connection = Connection::new(identity, sink);
        let id = {
            let mut broker = self.state();
            if broker.registry.len() >= self.max_connections {
                return Err(AdmissionError::AtCapacity {
                    limit: self.max_connections,
                });
            }
            broker.admit(connection)
        };

        info!(conn_id = %id, "Connection admitted");
        self.reply(&id, &ServerMessage::welcome());
        Ok(id)
    }

    /// Forget a connection. Safe to call more than once.
    pub fn disconnect(&self, id: &ConnectionId) -> bool {
        let removed = self.state().remove(id);
        if removed {
            info!(conn_id = %id, "Connection cleaned up");
        }
        removed
    }

    /// Parse and act on one inbound text frame.
    ///
    /// Malformed input is answered with a single `error` frame and never
    /// ends the connection.
    pub fn handle_text(&self, id: &ConnectionId, text: &str) {
        match serde_json::from_str::<ClientMessage>(text).map_err(ProtocolParseError::from) {
            Ok(msg) => self.handle_control(id, msg),
            Err(err) => {
                warn!(
                    conn_id = %id,
                    error = %err,
                    frame = %text.chars().take(100).collect::<String>(),
                    "Invalid client message"
                );
                self.reply(id, &ServerMessage::error(err.to_string()));
            }
        }
    }

    /// Binary frames carry the same JSON control messages as text frames.
    pub fn handle_binary(&self, id: &ConnectionId, bytes: &[u8]) {
        match std::str::from_utf8(bytes) {
            Ok(text) => self.handle_text(id, text),
            Err(e) => {
                warn!(conn_id = %id, error = %e, "Binary frame is not UTF-8");
                self.reply(
                    id,
                    &ServerMessage::error(format!("malformed control message: {e}")),
                );
            }
        }
    }

    pub fn handle_control(&self, id: &ConnectionId, msg: ClientMessage) {
        match msg {
            ClientMessage::Subscribe { vehicle_id } => {
                let key = topic_key(&vehicle_id);
                let Some(user) = self.state().subscribe(id, &key) else {
                    debug!(conn_id = %id, "Subscribe from unregistered connection");
                    return;
                };
                info!(conn_id = %id, topic = %key, "Subscribed");
                self.reply(
                    id,
                    &ServerMessage::Subscribed {
                        message: format!("subscribed to vehicle {vehicle_id}"),
                        vehicle_id,
                        user,
                        timestamp: chrono::Utc::now(),
                    },
                );
            }
            ClientMessage::Unsubscribe { vehicle_id } => {
                let key = topic_key(&vehicle_id);
                if self.state().unsubscribe(id, &key) {
                    info!(conn_id = %id, topic = %key, "Unsubscribed");
                }
                self.reply(
                    id,
                    &ServerMessage::Unsubscribed {
                        message: format!("unsubscribed from vehicle {vehicle_id}"),
                        vehicle_id,
                        timestamp: chrono::Utc::now(),
                    },
                );
            }
            ClientMessage::Ping => self.reply(id, &ServerMessage::pong()),
            ClientMessage::Unknown => {
                info!(conn_id = %id, "Ignoring unrecognized message type");
            }
        }
    }

    /// Send a frame to one connection, logging (never returning) failures.
    fn reply(&self, id: &ConnectionId, frame: &ServerMessage) {
        let Some(sink) = self.state().sink_of(id) else {
            return;
        };
        if let Err(e) = encode(frame).and_then(|msg| sink.send(msg)) {
            warn!(conn_id = %id, error = %e, "Failed to send reply");
        }
    }

    /// Deliver `event` to every open member of `key`.
    ///
    /// Best effort: a missing topic is a no-op and per-member failures are
    /// logged and counted, never returned as errors.
    pub fn publish(&self, key: &str, event: &Event) -> PublishReport {
        let recipients = self.state().recipients(key);
        if recipients.is_empty() {
            debug!(topic = %key, "No subscribers, nothing to publish");
            return PublishReport::default();
        }

        let frame = match encode(&event.to_frame()) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(topic = %key, error = %e, "Failed to encode event");
                return PublishReport::default();
            }
        };

        let outcomes = fan_out(&recipients, &frame);
        for (id, outcome) in &outcomes {
            if let DeliveryOutcome::Failed(e) = outcome {
                warn!(conn_id = %id, topic = %key, error = %e, "Delivery failed");
            }
        }

        let report = PublishReport::from_outcomes(&outcomes);
        debug!(
            topic = %key,
            kind = event.kind(),
            delivered = report.delivered,
            skipped = report.skipped,
            failed = report.failed,
            "Published event"
        );
        report
    }

    pub fn publish_reading(&self, vehicle_id: &str, payload: Value) -> PublishReport {
        let event = Event::reading(vehicle_id, payload);
        self.publish(&event.topic_key(), &event)
    }

    pub fn publish_alert(&self, vehicle_id: &str, label: &str, payload: Value) -> PublishReport {
        let event = Event::alert(vehicle_id, label, payload);
        self.publish(&event.topic_key(), &event)
    }

    /// Queue a WebSocket ping on every open connection. Returns how many
    /// were queued.
    pub fn ping_all(&self) -> usize {
        let sinks: Vec<Recipient> = self
            .state()
            .registry
            .iter()
            .map(|c| (c.id.clone(), Arc::clone(&c.sink)))
            .collect();

        fan_out(&sinks, &WsMessage::Ping(Default::default()))
            .iter()
            .filter(|(_, outcome)| matches!(outcome, DeliveryOutcome::Delivered))
            .count()
    }

    pub fn report(&self) -> StatsReport {
        self.state().report()
    }

    pub fn connection_count(&self) -> usize {
        self.state().registry.len()
    }

    /// Current state of `id`; `Closed` once it has been removed.
    pub fn connection_state(&self, id: &ConnectionId) -> ConnectionState {
        self.state()
            .registry
            .get(id)
            .map_or(ConnectionState::Closed, Connection::state)
    }

    pub fn is_connected(&self, id: &ConnectionId) -> bool {
        self.state().registry.contains(id)
    }

    pub fn subscriber_count(&self, key: &str) -> usize {
        self.state().topics.subscriber_count(key)
    }

    pub fn topic_count(&self) -> usize {
        self.state().topics.topic_count()
    }

    pub fn list_topics(&self) -> Vec<(String, usize)> {
        self.state().topics.list_topics()
    }
}
