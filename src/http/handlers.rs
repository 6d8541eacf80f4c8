use std::time::Duration;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::broker::StatsReport;
use crate::http::error::{AppError, AppResult};
use crate::http::extract::AuthUser;
use crate::http::state::AppState;
use crate::persistence::{Vehicle, VehicleStats};
use crate::simulator::{DEFAULT_BASE, SimulatedVehicle, SimulatorStatus};
use crate::telemetry::{ReadingInput, StoredReading, ingest as ingest_reading};

const DEFAULT_READINGS_LIMIT: usize = 100;

/// `{ "data": T }` envelope for read endpoints.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub correo: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub ok: bool,
    pub msg: String,
    pub data: StoredReading,
}

#[derive(Debug, Deserialize)]
pub struct ReadingsQuery {
    pub limit: Option<usize>,
}

/// A registered vehicle with its most recent reading, if any.
#[derive(Debug, Serialize)]
pub struct VehicleSummary {
    #[serde(flatten)]
    pub vehicle: Vehicle,
    pub ultima_lectura: Option<StoredReading>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StartSimulationRequest {
    /// Milliseconds between cycles.
    pub intervalo: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddVehicleRequest {
    pub vehicle_id: String,
    pub nombre: String,
    pub base_lat: Option<f64>,
    pub base_lng: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct SimulatorResponse {
    pub ok: bool,
    pub message: String,
    pub data: SimulatorStatus,
}

pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<LoginResponse>> {
    let Json(req) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let identity = state
        .accounts
        .authenticate(&req.correo, &req.password)
        .ok_or(AppError::InvalidCredentials)?;

    let token = state.authority.issue(&identity)?;
    info!(user_id = identity.id, "Login succeeded");
    Ok(Json(LoginResponse { token }))
}

/// Store a reading, then publish it to the vehicle's topic, plus an alert
/// when its status is not normal.
pub async fn ingest(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    body: Result<Json<ReadingInput>, JsonRejection>,
) -> AppResult<Json<IngestResponse>> {
    let Json(input) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let reading = ingest_reading(&state.store, &state.dispatcher, input, Utc::now())?;
    debug!(
        user_id = user.id,
        vehicle_id = %reading.vehiculo_id,
        "Reading ingested"
    );

    Ok(Json(IngestResponse {
        ok: true,
        msg: "Datos recibidos".to_string(),
        data: reading,
    }))
}

pub async fn sensor_data(
    _user: AuthUser,
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    query: Result<Query<ReadingsQuery>, QueryRejection>,
) -> AppResult<Json<DataResponse<Vec<StoredReading>>>> {
    let Path(vehicle_id) = path.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    require_vehicle(&state, &vehicle_id)?;
    let limit = query.limit.unwrap_or(DEFAULT_READINGS_LIMIT);
    let data = state.store.recent_readings(&vehicle_id, limit)?;
    Ok(Json(DataResponse { data }))
}

/// Readings of one vehicle whose status raised an alert, newest first.
pub async fn vehicle_alerts(
    _user: AuthUser,
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    query: Result<Query<ReadingsQuery>, QueryRejection>,
) -> AppResult<Json<DataResponse<Vec<StoredReading>>>> {
    let Path(vehicle_id) = path.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    require_vehicle(&state, &vehicle_id)?;
    let limit = query.limit.unwrap_or(DEFAULT_READINGS_LIMIT);
    let data = state.store.alert_readings(&vehicle_id, limit)?;
    Ok(Json(DataResponse { data }))
}

pub async fn vehicle_stats(
    _user: AuthUser,
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> AppResult<Json<DataResponse<VehicleStats>>> {
    let Path(vehicle_id) = path.map_err(|e| AppError::BadRequest(e.body_text()))?;
    require_vehicle(&state, &vehicle_id)?;
    let data = state.store.vehicle_stats(&vehicle_id)?;
    Ok(Json(DataResponse { data }))
}

pub async fn list_vehicles(
    _user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<VehicleSummary>>>> {
    let data = state
        .store
        .list_vehicles()?
        .into_iter()
        .map(|vehicle| -> AppResult<VehicleSummary> {
            let ultima_lectura = state.store.latest_reading(&vehicle.id)?;
            Ok(VehicleSummary {
                vehicle,
                ultima_lectura,
            })
        })
        .collect::<AppResult<Vec<_>>>()?;
    Ok(Json(DataResponse { data }))
}

pub async fn ws_stats(
    _user: AuthUser,
    State(state): State<AppState>,
) -> Json<DataResponse<StatsReport>> {
    Json(DataResponse {
        data: state.dispatcher.report(),
    })
}

/// The body is optional; without a JSON content type the configured
/// interval is used.
pub async fn start_simulation(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    body: Result<Json<StartSimulationRequest>, JsonRejection>,
) -> AppResult<Json<SimulatorResponse>> {
    let req = match body {
        Ok(Json(req)) => req,
        Err(JsonRejection::MissingJsonContentType(_)) => StartSimulationRequest::default(),
        Err(e) => return Err(AppError::BadRequest(e.body_text())),
    };
    let interval = req
        .intervalo
        .map_or(state.simulator.default_interval(), Duration::from_millis);

    let message = if state.simulator.start(interval) {
        info!(user_id = user.id, "Simulation started over HTTP");
        "Simulación iniciada correctamente"
    } else {
        "La simulación ya está corriendo"
    };
    Ok(Json(SimulatorResponse {
        ok: true,
        message: message.to_string(),
        data: state.simulator.status(),
    }))
}

pub async fn stop_simulation(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> Json<SimulatorResponse> {
    let message = if state.simulator.stop() {
        info!(user_id = user.id, "Simulation stopped over HTTP");
        "Simulación detenida correctamente"
    } else {
        "La simulación no está corriendo"
    };
    Json(SimulatorResponse {
        ok: true,
        message: message.to_string(),
        data: state.simulator.status(),
    })
}

pub async fn simulation_status(
    _user: AuthUser,
    State(state): State<AppState>,
) -> Json<DataResponse<SimulatorStatus>> {
    Json(DataResponse {
        data: state.simulator.status(),
    })
}

pub async fn add_simulated_vehicle(
    _user: AuthUser,
    State(state): State<AppState>,
    body: Result<Json<AddVehicleRequest>, JsonRejection>,
) -> AppResult<Json<SimulatorResponse>> {
    let Json(req) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    if req.vehicle_id.trim().is_empty() || req.nombre.trim().is_empty() {
        return Err(AppError::BadRequest(
            "vehicleId and nombre are required".to_string(),
        ));
    }

    let vehicle = SimulatedVehicle::new(
        &req.vehicle_id,
        &req.nombre,
        req.base_lat.unwrap_or(DEFAULT_BASE.0),
        req.base_lng.unwrap_or(DEFAULT_BASE.1),
    );
    state.simulator.add_vehicle(vehicle)?;
    info!(vehicle_id = %req.vehicle_id, "Vehicle added to simulation");

    Ok(Json(SimulatorResponse {
        ok: true,
        message: "Vehículo agregado correctamente".to_string(),
        data: state.simulator.status(),
    }))
}

pub async fn remove_simulated_vehicle(
    _user: AuthUser,
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> AppResult<Json<SimulatorResponse>> {
    let Path(vehicle_id) = path.map_err(|e| AppError::BadRequest(e.body_text()))?;
    if !state.simulator.remove_vehicle(&vehicle_id) {
        return Err(AppError::NotFound {
            entity: "simulated vehicle",
            id: vehicle_id,
        });
    }
    info!(vehicle_id = %vehicle_id, "Vehicle removed from simulation");

    Ok(Json(SimulatorResponse {
        ok: true,
        message: "Vehículo removido correctamente".to_string(),
        data: state.simulator.status(),
    }))
}

fn require_vehicle(state: &AppState, vehicle_id: &str) -> AppResult<Vehicle> {
    state
        .store
        .find_vehicle(vehicle_id)?
        .ok_or_else(|| AppError::NotFound {
            entity: "vehicle",
            id: vehicle_id.to_string(),
        })
}
