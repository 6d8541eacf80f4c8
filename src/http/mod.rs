//! The `http` module exposes the REST side of the service: login, telemetry
//! ingestion (which feeds the dispatcher), read-only queries and the
//! simulator controls under `/api/simulador`.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod state;

use axum::Router;
use axum::routing::{delete, get, post};
use tokio::net::TcpListener;
use tracing::info;

pub use error::{AppError, AppResult};
pub use state::AppState;

/// Build the API router. Every route except `/api/login` requires a bearer
/// token.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/login", post(handlers::login))
        .route("/api/ingesta", post(handlers::ingest))
        .route("/api/sensores/{vehicle_id}", get(handlers::sensor_data))
        .route("/api/alerts/{vehicle_id}", get(handlers::vehicle_alerts))
        .route("/api/stats/{vehicle_id}", get(handlers::vehicle_stats))
        .route("/api/vehicles", get(handlers::list_vehicles))
        .route("/api/ws/stats", get(handlers::ws_stats))
        .route("/api/simulador/iniciar", post(handlers::start_simulation))
        .route("/api/simulador/detener", post(handlers::stop_simulation))
        .route("/api/simulador/estado", get(handlers::simulation_status))
        .route("/api/simulador/vehiculos", post(handlers::add_simulated_vehicle))
        .route(
            "/api/simulador/vehiculos/{vehicle_id}",
            delete(handlers::remove_simulated_vehicle),
        )
        .with_state(state)
}

pub async fn start_http_server(addr: &str, state: AppState) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP API listening on http://{}", listener.local_addr()?);
    axum::serve(listener, build_router(state)).await
}

#[cfg(test)]
mod tests;
