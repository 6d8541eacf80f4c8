use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::telemetry::status::Status;
use crate::utils::error::ValidationError;

/// Body of `POST /api/ingesta`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingInput {
    pub vehiculo_id: String,
    #[serde(default)]
    pub gps: Option<String>,
    pub combustible: f64,
    pub temperatura: f64,
    #[serde(default)]
    pub velocidad: f64,
    #[serde(default)]
    pub latitud: Option<f64>,
    #[serde(default)]
    pub longitud: Option<f64>,
    /// Sample time reported by the device; server time when absent.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ReadingInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.vehiculo_id.trim().is_empty() {
            return Err(ValidationError::MissingVehicle);
        }
        for (field, value) in [
            ("combustible", self.combustible),
            ("temperatura", self.temperatura),
            ("velocidad", self.velocidad),
        ] {
            if !value.is_finite() {
                return Err(ValidationError::NotFinite { field });
            }
        }
        if !(0.0..=100.0).contains(&self.combustible) {
            return Err(ValidationError::FuelOutOfRange(self.combustible));
        }
        if self.velocidad < 0.0 {
            return Err(ValidationError::NegativeSpeed(self.velocidad));
        }
        Ok(())
    }
}

/// A validated reading as persisted and published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredReading {
    pub id: Uuid,
    pub vehiculo_id: String,
    pub gps: Option<String>,
    pub combustible: f64,
    pub temperatura: f64,
    pub velocidad: f64,
    pub latitud: Option<f64>,
    pub longitud: Option<f64>,
    pub estado: Status,
    pub timestamp: DateTime<Utc>,
}

impl StoredReading {
    /// Validate `input` and classify it. `now` stands in for a missing
    /// device timestamp.
    pub fn from_input(input: ReadingInput, now: DateTime<Utc>) -> Result<Self, ValidationError> {
        input.validate()?;
        let estado = Status::classify(input.combustible, input.temperatura, input.velocidad);
        Ok(Self {
            id: Uuid::new_v4(),
            vehiculo_id: input.vehiculo_id,
            gps: input.gps,
            combustible: input.combustible,
            temperatura: input.temperatura,
            velocidad: input.velocidad,
            latitud: input.latitud,
            longitud: input.longitud,
            estado,
            timestamp: input.timestamp.unwrap_or(now),
        })
    }
}
