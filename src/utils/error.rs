//! Error types shared across the `telepub` service.
//!
//! Every failure the dispatch layer can observe has its own type so the
//! propagation policy is visible in signatures: authentication failures end a
//! connection, parse and delivery failures are contained by the dispatcher,
//! storage failures surface through the HTTP layer.

use thiserror::Error;

/// No usable credential was presented at connect time (or on an HTTP request).
#[derive(Debug, Error)]
pub enum AuthenticationError {
    #[error("no credential presented")]
    MissingCredential,

    #[error("credential has expired")]
    Expired,

    #[error("invalid credential: {0}")]
    Invalid(String),
}

impl From<jsonwebtoken::errors::Error> for AuthenticationError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => Self::Expired,
            _ => Self::Invalid(err.to_string()),
        }
    }
}

/// Reasons a connection is refused before it reaches the registry.
#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("not authenticated: {0}")]
    Unauthenticated(#[from] AuthenticationError),

    #[error("server at capacity ({limit} connections)")]
    AtCapacity { limit: usize },
}

/// A control frame from a client could not be understood.
#[derive(Debug, Error)]
#[error("malformed control message: {0}")]
pub struct ProtocolParseError(#[from] pub serde_json::Error);

/// A frame could not be handed to one subscriber's transport.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("transport closed")]
    Closed,

    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failures of the telemetry store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Sled(#[from] sled::Error),

    #[error("record encoding error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// An ingested reading failed field validation.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("vehiculo_id must not be empty")]
    MissingVehicle,

    #[error("combustible must be between 0 and 100, got {0}")]
    FuelOutOfRange(f64),

    #[error("velocidad must not be negative, got {0}")]
    NegativeSpeed(f64),

    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },
}

/// Failures of the ingestion pipeline (validate, store, publish).
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("vehicle {0} not found")]
    UnknownVehicle(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
