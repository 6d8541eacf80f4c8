use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::telemetry::ReadingInput;

/// Base position for vehicles added without one.
pub const DEFAULT_BASE: (f64, f64) = (6.25184, -75.56359);

/// Radius of the circle, in degrees, each simulated vehicle drives around
/// its base.
const ORBIT_RADIUS: f64 = 0.005;
/// Radians per second of simulated time.
const ORBIT_SPEED: f64 = 0.002;

/// Known bases for the default fleet; other ids start at `DEFAULT_BASE`.
const FLEET_BASES: [(&str, f64, f64); 3] = [
    ("VH1ZU432E", 4.68354356704774, -74.12042084673625),
    ("VEH2SDF33", 4.828713450549544, -74.04927894044259),
    ("VEH334345SDF", 6.263130238372258, -75.57929489793553),
];

/// A vehicle the simulator produces readings for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatedVehicle {
    pub id: String,
    pub nombre: String,
    pub base_lat: f64,
    pub base_lng: f64,
}

impl SimulatedVehicle {
    pub fn new(id: &str, nombre: &str, base_lat: f64, base_lng: f64) -> Self {
        Self {
            id: id.to_string(),
            nombre: nombre.to_string(),
            base_lat,
            base_lng,
        }
    }

    /// A vehicle named after its id, placed at its fleet base if it has one.
    pub fn from_fleet(id: &str) -> Self {
        let (lat, lng) = FLEET_BASES
            .iter()
            .find(|(known, _, _)| *known == id)
            .map_or(DEFAULT_BASE, |&(_, lat, lng)| (lat, lng));
        Self::new(id, id, lat, lng)
    }

    /// Position after `elapsed` of simulated driving.
    pub fn position(&self, elapsed: Duration) -> (f64, f64) {
        let angle = elapsed.as_secs_f64() * ORBIT_SPEED;
        (
            self.base_lat + angle.sin() * ORBIT_RADIUS,
            self.base_lng + angle.cos() * ORBIT_RADIUS,
        )
    }
}

/// One random reading for `vehicle`: fuel 1..=100, temperature 20..140,
/// speed 10..130.
pub fn generate_reading<R: Rng + ?Sized>(
    vehicle: &SimulatedVehicle,
    elapsed: Duration,
    now: DateTime<Utc>,
    rng: &mut R,
) -> ReadingInput {
    let (latitud, longitud) = vehicle.position(elapsed);
    ReadingInput {
        vehiculo_id: vehicle.id.clone(),
        gps: Some(format!("GPS{}", rng.random_range(0..1000))),
        combustible: f64::from(rng.random_range(1..=100u32)),
        temperatura: f64::from(rng.random_range(20..140u32)),
        velocidad: f64::from(rng.random_range(10..130u32)),
        latitud: Some(latitud),
        longitud: Some(longitud),
        timestamp: Some(now),
    }
}
