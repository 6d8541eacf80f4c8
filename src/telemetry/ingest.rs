use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::broker::Dispatcher;
use crate::persistence::TelemetryStore;
use crate::telemetry::{ReadingInput, StoredReading};
use crate::utils::error::{IngestError, StoreError};

/// Validate, store and publish one reading.
///
/// The reading is only published after it is stored. An alert follows the
/// reading on the same topic when its status is not normal.
pub fn ingest(
    store: &TelemetryStore,
    dispatcher: &Dispatcher,
    input: ReadingInput,
    now: DateTime<Utc>,
) -> Result<StoredReading, IngestError> {
    let reading = StoredReading::from_input(input, now)?;
    if store.find_vehicle(&reading.vehiculo_id)?.is_none() {
        return Err(IngestError::UnknownVehicle(reading.vehiculo_id));
    }
    store.insert_reading(&reading)?;

    let payload = serde_json::to_value(&reading).map_err(StoreError::from)?;
    let report = dispatcher.publish_reading(&reading.vehiculo_id, payload.clone());
    debug!(
        vehicle_id = %reading.vehiculo_id,
        delivered = report.delivered,
        "Reading stored and published"
    );

    if reading.estado.is_alert() {
        dispatcher.publish_alert(&reading.vehiculo_id, reading.estado.as_str(), payload);
        info!(vehicle_id = %reading.vehiculo_id, estado = %reading.estado, "Alert raised");
    }
    Ok(reading)
}
