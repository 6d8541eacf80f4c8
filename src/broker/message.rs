//! Event definitions for the dispatcher
//!
//! An `Event` is what the ingestion path hands to `Dispatcher::publish`. It
//! is never stored: publish turns it into a `ServerMessage` envelope once and
//! fans the encoded frame out to the topic's members.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::broker::topic::topic_key;
use crate::transport::message::{AlertBody, ServerMessage};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A freshly stored telemetry reading.
    Reading {
        vehicle_id: String,
        payload: Value,
        timestamp: DateTime<Utc>,
    },
    /// A reading whose status is not `normal`.
    Alert {
        vehicle_id: String,
        label: String,
        payload: Value,
        timestamp: DateTime<Utc>,
    },
}

impl Event {
    pub fn reading(vehicle_id: impl Into<String>, payload: Value) -> Self {
        Self::Reading {
            vehicle_id: vehicle_id.into(),
            payload,
            timestamp: Utc::now(),
        }
    }

    pub fn alert(vehicle_id: impl Into<String>, label: impl Into<String>, payload: Value) -> Self {
        Self::Alert {
            vehicle_id: vehicle_id.into(),
            label: label.into(),
            payload,
            timestamp: Utc::now(),
        }
    }

    pub fn vehicle_id(&self) -> &str {
        match self {
            Self::Reading { vehicle_id, .. } | Self::Alert { vehicle_id, .. } => vehicle_id,
        }
    }

    /// The topic this event belongs to (`vehicle_<id>`).
    pub fn topic_key(&self) -> String {
        topic_key(self.vehicle_id())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Reading { .. } => "sensor_data",
            Self::Alert { .. } => "alert",
        }
    }

    pub fn to_frame(&self) -> ServerMessage {
        match self {
            Self::Reading {
                vehicle_id,
                payload,
                timestamp,
            } => ServerMessage::SensorData {
                vehicle_id: vehicle_id.clone(),
                data: payload.clone(),
                timestamp: *timestamp,
            },
            Self::Alert {
                vehicle_id,
                label,
                payload,
                timestamp,
            } => ServerMessage::Alert {
                vehicle_id: vehicle_id.clone(),
                alert: AlertBody {
                    tipo: label.clone(),
                    datos: payload.clone(),
                    timestamp: *timestamp,
                },
                timestamp: *timestamp,
            },
        }
    }
}
