//! The `broker` module is the real-time dispatch core: the connection
//! registry, the vehicle topic table, the `Dispatcher` that ties them to the
//! control protocol and to publishing, and the stats snapshot.

pub mod engine;
pub mod message;
pub mod registry;
pub mod stats;
pub mod topic;

pub use engine::{Broker, DeliveryOutcome, Dispatcher, PublishReport};
pub use message::Event;
pub use stats::{StatsReport, TopicStats};
pub use topic::topic_key;
