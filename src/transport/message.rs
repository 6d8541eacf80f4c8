//! Wire protocol
//!
//! One JSON object per text frame in both directions, tagged by `type`.
//! Field names are camelCase on the wire (`vehicleId`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::Identity;

/// Control messages a client may send.
#[derive(Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    Subscribe {
        vehicle_id: String,
    },
    Unsubscribe {
        vehicle_id: String,
    },
    Ping,
    /// Any well-formed message whose `type` is not understood.
    #[serde(other)]
    Unknown,
}

/// Frames the server pushes to a client.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    Connection {
        message: String,
        timestamp: DateTime<Utc>,
    },
    Subscribed {
        vehicle_id: String,
        user: Identity,
        message: String,
        timestamp: DateTime<Utc>,
    },
    Unsubscribed {
        vehicle_id: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
    Pong {
        /// Milliseconds since the UNIX epoch.
        timestamp: i64,
    },
    Error {
        message: String,
        timestamp: DateTime<Utc>,
    },
    SensorData {
        vehicle_id: String,
        data: Value,
        timestamp: DateTime<Utc>,
    },
    Alert {
        vehicle_id: String,
        alert: AlertBody,
        timestamp: DateTime<Utc>,
    },
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AlertBody {
    pub tipo: String,
    pub datos: Value,
    pub timestamp: DateTime<Utc>,
}

impl ServerMessage {
    pub fn welcome() -> Self {
        Self::Connection {
            message: "connection established".to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn pong() -> Self {
        Self::Pong {
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}
