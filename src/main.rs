//! CLI for telepub
//!
//! Subcommands:
//! - `server`: run the WebSocket dispatcher and the HTTP API (and the
//!   simulator, when `simulator.autostart` is set)
//! - `watch`: connect, subscribe to one vehicle and print frames (smoke test)

use std::time::Duration;

use clap::Parser;
use telepub::auth::{Accounts, JwtAuthority};
use telepub::broker::Dispatcher;
use telepub::config::load_config;
use telepub::http::{AppState, start_http_server};
use telepub::persistence::TelemetryStore;
use telepub::simulator::{SimulatedVehicle, Simulator};
use telepub::transport::{start_heartbeat, start_websocket_server};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "telepub")]
enum Command {
    /// Start the WebSocket dispatcher and the HTTP API
    Server,
    /// Subscribe to a vehicle and print every frame received
    Watch {
        /// WebSocket server URL
        #[arg(long, default_value = "ws://127.0.0.1:8080")]
        url: String,
        /// Bearer token from `POST /api/login`
        #[arg(long)]
        token: String,
        /// Vehicle id to subscribe to
        #[arg(long)]
        vehicle: String,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    telepub::utils::logging::init("info");

    match Command::parse() {
        Command::Server => {
            if let Err(e) = run_server().await {
                error!("Server failed: {}", e);
            }
        }
        Command::Watch {
            url,
            token,
            vehicle,
        } => {
            if let Err(e) = run_watch(&url, &token, &vehicle).await {
                error!("Watch failed: {}", e);
            }
        }
    }
}

async fn run_server() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;

    let store = TelemetryStore::open(
        &config.storage.path,
        config.storage.ttl_secs,
        config.storage.max_readings_per_vehicle,
    )?;
    for vehicle_id in &config.fleet.vehicles {
        store.register_vehicle(vehicle_id, vehicle_id)?;
    }

    let token_ttl = chrono::Duration::try_seconds(config.auth.token_ttl_secs)
        .ok_or("auth.token_ttl_secs out of range")?;
    let authority = JwtAuthority::new(&config.auth.jwt_secret, token_ttl);
    let dispatcher = Dispatcher::new(authority.clone(), config.dispatcher.max_connections);
    let simulator = Simulator::new(
        store.clone(),
        dispatcher.clone(),
        config
            .fleet
            .vehicles
            .iter()
            .map(|id| SimulatedVehicle::from_fleet(id))
            .collect(),
        Duration::from_millis(config.simulator.interval_ms),
    );
    if config.simulator.autostart {
        simulator.start(simulator.default_interval());
    }
    let state = AppState {
        dispatcher: dispatcher.clone(),
        store,
        authority,
        accounts: Accounts::new(config.auth.users.clone()),
        simulator: simulator.clone(),
    };

    let ws_addr = format!("{}:{}", config.server.host, config.server.ws_port);
    let http_addr = format!("{}:{}", config.server.host, config.server.http_port);

    let heartbeat = start_heartbeat(
        dispatcher.clone(),
        Duration::from_secs(config.dispatcher.heartbeat_secs),
    );

    tokio::select! {
        res = start_websocket_server(&ws_addr, dispatcher) => {
            error!("WebSocket server exited unexpectedly: {:?}", res);
        }
        res = start_http_server(&http_addr, state) => {
            error!("HTTP server exited unexpectedly: {:?}", res);
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    simulator.stop();
    heartbeat.abort();
    Ok(())
}

async fn run_watch(
    url: &str,
    token: &str,
    vehicle: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    use futures_util::{SinkExt, StreamExt};
    use serde_json::json;
    use tokio_tungstenite::connect_async;
    use tokio_tungstenite::tungstenite::Message as WsMessage;

    let mut url = url::Url::parse(url)?;
    url.query_pairs_mut().append_pair("token", token);
    let (mut ws_stream, _response) = connect_async(url.as_str()).await?;

    let subscribe = json!({ "type": "subscribe", "vehicleId": vehicle });
    ws_stream
        .send(WsMessage::Text(subscribe.to_string().into()))
        .await?;

    loop {
        tokio::select! {
            msg = ws_stream.next() => match msg {
                Some(Ok(WsMessage::Text(text))) => println!("{text}"),
                Some(Ok(WsMessage::Close(frame))) => {
                    info!(?frame, "Server closed the connection");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                ws_stream.close(None).await?;
                break;
            }
        }
    }

    Ok(())
}
