//! # telepub
//!
//! `telepub` is the real-time side of a vehicle telemetry service. Observers
//! connect over WebSockets, authenticate once with a bearer token, and
//! subscribe to per-vehicle topics; every reading ingested through the HTTP
//! API is fanned out to that vehicle's subscribers, followed by an alert when
//! the reading is out of range.
//!
//! ## Core Modules
//!
//! - `broker`: connection registry, topic table and the `Dispatcher` that
//!   routes events to subscribers.
//! - `client`: per-connection state and the outbound `FrameSink`.
//! - `transport`: the WebSocket protocol, server loop and heartbeat.
//! - `auth`: token issuance/verification and login accounts.
//! - `telemetry`: readings, validation and status classification.
//! - `persistence`: the `sled`-backed vehicle and reading store.
//! - `http`: the REST API (login, ingestion, queries, simulator control).
//! - `simulator`: synthetic readings for a configurable set of vehicles.
//! - `config`: layered configuration loading.
//! - `utils`: error types and logging setup.

pub mod auth;
pub mod broker;
pub mod client;
pub mod config;
pub mod http;
pub mod persistence;
pub mod simulator;
pub mod telemetry;
pub mod transport;
pub mod utils;
