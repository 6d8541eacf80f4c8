//! The `simulator` module feeds synthetic readings into the same ingestion
//! path HTTP uses, so dashboards have live data without real devices.
//!
//! A running simulation is one tokio task that, once per interval, produces
//! a reading for every simulated vehicle. Vehicles can be added or removed
//! while it runs; the next cycle picks up the change.

pub mod generator;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::broker::Dispatcher;
use crate::persistence::TelemetryStore;
use crate::telemetry::ingest;
use crate::utils::error::StoreError;

pub use generator::{DEFAULT_BASE, SimulatedVehicle, generate_reading};

/// Shortest accepted cycle; smaller requests are raised to it.
pub const MIN_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
struct SimulatorState {
    vehicles: Vec<SimulatedVehicle>,
    task: Option<JoinHandle<()>>,
    interval: Option<Duration>,
}

impl SimulatorState {
    fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

/// Snapshot returned by the control endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatorStatus {
    pub is_running: bool,
    pub interval_ms: Option<u64>,
    pub total_vehicles: usize,
    pub vehicles: Vec<SimulatedVehicle>,
}

/// Outcome of one simulation cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub sent: usize,
    pub failed: usize,
}

/// Cloneable handle to the simulation.
#[derive(Debug, Clone)]
pub struct Simulator {
    store: TelemetryStore,
    dispatcher: Dispatcher,
    default_interval: Duration,
    state: Arc<Mutex<SimulatorState>>,
}

impl Simulator {
    pub fn new(
        store: TelemetryStore,
        dispatcher: Dispatcher,
        vehicles: Vec<SimulatedVehicle>,
        default_interval: Duration,
    ) -> Self {
        Self {
            store,
            dispatcher,
            default_interval,
            state: Arc::new(Mutex::new(SimulatorState {
                vehicles,
                ..Default::default()
            })),
        }
    }

    /// Interval used when a start request does not name one.
    pub fn default_interval(&self) -> Duration {
        self.default_interval
    }

    fn state(&self) -> MutexGuard<'_, SimulatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start producing readings every `interval`. Returns `false` when a
    /// simulation is already running; it keeps its interval.
    pub fn start(&self, interval: Duration) -> bool {
        let interval = interval.max(MIN_INTERVAL);
        let mut state = self.state();
        if state.is_running() {
            warn!("Simulation already running");
            return false;
        }

        let simulator = self.clone();
        state.task = Some(tokio::spawn(async move {
            let started = Instant::now();
            let mut ticker = tokio::time::interval(interval);
            // first tick completes immediately
            ticker.tick().await;

            let mut cycle: u64 = 0;
            loop {
                ticker.tick().await;
                cycle += 1;
                let report = simulator.run_cycle(started.elapsed());
                debug!(cycle, sent = report.sent, failed = report.failed, "Simulation cycle");
            }
        }));
        state.interval = Some(interval);
        info!(
            interval_ms = interval.as_millis() as u64,
            vehicles = state.vehicles.len(),
            "Simulation started"
        );
        true
    }

    /// Stop the running simulation. Returns `false` when none was running.
    pub fn stop(&self) -> bool {
        let mut state = self.state();
        let was_running = state.is_running();
        if let Some(task) = state.task.take() {
            task.abort();
        }
        state.interval = None;
        if was_running {
            info!("Simulation stopped");
        }
        was_running
    }

    pub fn status(&self) -> SimulatorStatus {
        let state = self.state();
        SimulatorStatus {
            is_running: state.is_running(),
            interval_ms: state
                .interval
                .filter(|_| state.is_running())
                .map(|i| i.as_millis() as u64),
            total_vehicles: state.vehicles.len(),
            vehicles: state.vehicles.clone(),
        }
    }

    /// Register `vehicle` with the store so its readings are accepted, then
    /// simulate it. A vehicle with the same id is replaced.
    pub fn add_vehicle(&self, vehicle: SimulatedVehicle) -> Result<(), StoreError> {
        self.store.register_vehicle(&vehicle.id, &vehicle.nombre)?;
        let mut state = self.state();
        match state.vehicles.iter_mut().find(|v| v.id == vehicle.id) {
            Some(existing) => *existing = vehicle,
            None => state.vehicles.push(vehicle),
        }
        Ok(())
    }

    /// Stop simulating `vehicle_id`. Its registration and history stay.
    pub fn remove_vehicle(&self, vehicle_id: &str) -> bool {
        let mut state = self.state();
        let before = state.vehicles.len();
        state.vehicles.retain(|v| v.id != vehicle_id);
        before != state.vehicles.len()
    }

    /// Ingest one reading per simulated vehicle, as of `elapsed` into the
    /// simulation.
    pub fn run_cycle(&self, elapsed: Duration) -> CycleReport {
        let vehicles = self.state().vehicles.clone();
        let mut rng = rand::rng();
        let mut report = CycleReport::default();

        for vehicle in &vehicles {
            let now = Utc::now();
            let input = generate_reading(vehicle, elapsed, now, &mut rng);
            match ingest(&self.store, &self.dispatcher, input, now) {
                Ok(reading) => {
                    report.sent += 1;
                    debug!(
                        vehicle_id = %vehicle.id,
                        estado = %reading.estado,
                        "Simulated reading"
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(vehicle_id = %vehicle.id, error = %e, "Simulated reading rejected");
                }
            }
        }
        report
    }
}
