//! Vehicle telemetry readings and their validation.
//!
//! `Status` decides whether a reading also raises an alert. `ingest` is the
//! one path by which readings are stored and published.

pub mod ingest;
pub mod reading;
pub mod status;

pub use ingest::ingest;
pub use reading::{ReadingInput, StoredReading};
pub use status::Status;
