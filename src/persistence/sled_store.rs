use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sled::{Db, IVec, Tree};
use tracing::debug;

use crate::telemetry::StoredReading;
use crate::utils::error::StoreError;

const VEHICLES_TREE: &str = "vehicles";
const STATS_WINDOW_HOURS: i64 = 24;

/// A vehicle known to the fleet; ingestion is refused for anything else.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Vehicle {
    pub id: String,
    pub nombre: String,
    pub registered_at: DateTime<Utc>,
}

/// Aggregates over one vehicle's readings in the last 24 hours. Averages and
/// extremes are `None` when there were no readings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct VehicleStats {
    pub total_lecturas: u64,
    pub promedio_combustible: Option<f64>,
    pub promedio_temperatura: Option<f64>,
    pub promedio_velocidad: Option<f64>,
    pub max_temperatura: Option<f64>,
    pub min_combustible: Option<f64>,
    pub max_velocidad: Option<f64>,
}

/// Embedded telemetry store.
///
/// Readings live in one tree per vehicle, keyed `<millis:020>_<uuid>` so the
/// natural key order is chronological.
#[derive(Clone)]
pub struct TelemetryStore {
    db: Db,
    vehicles: Tree,
    ttl_seconds: Option<i64>,
    max_readings_per_vehicle: Option<usize>,
}

impl TelemetryStore {
    pub fn open(
        path: &str,
        ttl_seconds: Option<i64>,
        max_readings_per_vehicle: Option<usize>,
    ) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        let vehicles = db.open_tree(VEHICLES_TREE)?;
        Ok(Self {
            db,
            vehicles,
            ttl_seconds,
            max_readings_per_vehicle,
        })
    }

    /// Register a vehicle; an existing registration is returned unchanged.
    pub fn register_vehicle(&self, id: &str, nombre: &str) -> Result<Vehicle, StoreError> {
        if let Some(existing) = self.find_vehicle(id)? {
            return Ok(existing);
        }
        let vehicle = Vehicle {
            id: id.to_string(),
            nombre: nombre.to_string(),
            registered_at: Utc::now(),
        };
        self.vehicles
            .insert(id.as_bytes(), serde_json::to_vec(&vehicle)?)?;
        debug!(vehicle_id = %id, "Vehicle registered");
        Ok(vehicle)
    }

    pub fn find_vehicle(&self, id: &str) -> Result<Option<Vehicle>, StoreError> {
        match self.vehicles.get(id.as_bytes())? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn list_vehicles(&self) -> Result<Vec<Vehicle>, StoreError> {
        self.vehicles
            .iter()
            .values()
            .map(decode)
            .collect()
    }

    pub fn insert_reading(&self, reading: &StoredReading) -> Result<(), StoreError> {
        let tree = self.readings_tree(&reading.vehiculo_id)?;
        let key = reading_key(reading.timestamp, &reading.id.to_string());
        tree.insert(key.as_bytes(), serde_json::to_vec(reading)?)?;

        if let Some(max) = self.max_readings_per_vehicle {
            while tree.len() > max {
                if tree.pop_min()?.is_none() {
                    break;
                }
            }
        }
        Ok(())
    }

    /// Up to `limit` readings, newest first.
    pub fn recent_readings(
        &self,
        vehicle_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredReading>, StoreError> {
        let tree = self.readings_tree(vehicle_id)?;
        self.cleanup_old_readings(&tree)?;
        tree.iter()
            .values()
            .rev()
            .take(limit)
            .map(decode)
            .collect()
    }

    /// Up to `limit` readings whose status raised an alert, newest first.
    pub fn alert_readings(
        &self,
        vehicle_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredReading>, StoreError> {
        let tree = self.readings_tree(vehicle_id)?;
        self.cleanup_old_readings(&tree)?;
        let mut alerts = Vec::new();
        for raw in tree.iter().values().rev() {
            if alerts.len() >= limit {
                break;
            }
            let reading: StoredReading = decode(raw)?;
            if reading.estado.is_alert() {
                alerts.push(reading);
            }
        }
        Ok(alerts)
    }

    pub fn latest_reading(&self, vehicle_id: &str) -> Result<Option<StoredReading>, StoreError> {
        Ok(self.recent_readings(vehicle_id, 1)?.pop())
    }

    pub fn vehicle_stats(&self, vehicle_id: &str) -> Result<VehicleStats, StoreError> {
        let tree = self.readings_tree(vehicle_id)?;
        self.cleanup_old_readings(&tree)?;
        let since = reading_key(Utc::now() - Duration::hours(STATS_WINDOW_HOURS), "");

        let mut stats = VehicleStats::default();
        let (mut fuel, mut temp, mut speed) = (0.0, 0.0, 0.0);
        for raw in tree.range(since.as_bytes()..).values() {
            let r: StoredReading = decode(raw)?;
            stats.total_lecturas += 1;
            fuel += r.combustible;
            temp += r.temperatura;
            speed += r.velocidad;
            stats.max_temperatura = Some(
                stats
                    .max_temperatura
                    .map_or(r.temperatura, |m| m.max(r.temperatura)),
            );
            stats.min_combustible = Some(
                stats
                    .min_combustible
                    .map_or(r.combustible, |m| m.min(r.combustible)),
            );
            stats.max_velocidad = Some(
                stats
                    .max_velocidad
                    .map_or(r.velocidad, |m| m.max(r.velocidad)),
            );
        }

        if stats.total_lecturas > 0 {
            let n = stats.total_lecturas as f64;
            stats.promedio_combustible = Some(fuel / n);
            stats.promedio_temperatura = Some(temp / n);
            stats.promedio_velocidad = Some(speed / n);
        }
        Ok(stats)
    }

    fn readings_tree(&self, vehicle_id: &str) -> Result<Tree, StoreError> {
        Ok(self.db.open_tree(format!("readings/{vehicle_id}"))?)
    }

    fn cleanup_old_readings(&self, tree: &Tree) -> Result<(), StoreError> {
        let Some(ttl) = self.ttl_seconds else {
            return Ok(());
        };
        // a ttl reaching past the representable range keeps everything
        let Some(cutoff) =
            Duration::try_seconds(ttl).and_then(|d| Utc::now().checked_sub_signed(d))
        else {
            return Ok(());
        };
        let cutoff = reading_key(cutoff, "");
        let old_keys: Vec<_> = tree
            .range(..cutoff.as_bytes())
            .keys()
            .collect::<Result<_, _>>()?;

        for key in old_keys {
            tree.remove(key)?;
        }
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(raw: sled::Result<IVec>) -> Result<T, StoreError> {
    Ok(serde_json::from_slice(&raw?)?)
}

/// Keys sort by time; readings before the epoch collapse onto zero.
fn reading_key(timestamp: DateTime<Utc>, suffix: &str) -> String {
    let millis = timestamp.timestamp_millis().max(0);
    if suffix.is_empty() {
        format!("{millis:020}")
    } else {
        format!("{millis:020}_{suffix}")
    }
}

impl std::fmt::Debug for TelemetryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryStore")
            .field("db", &"sled::Db")
            .field("ttl_seconds", &self.ttl_seconds)
            .field("max_readings_per_vehicle", &self.max_readings_per_vehicle)
            .finish()
    }
}
