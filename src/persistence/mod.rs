//! The `persistence` module stores the fleet registry and telemetry history.
//!
//! It uses `sled` as an embedded key-value store. Readings are kept per
//! vehicle under time-ordered keys: "latest N" is a reverse scan and
//! retention drops a key range.

pub mod sled_store;

pub use sled_store::{TelemetryStore, Vehicle, VehicleStats};
