use super::{AppState, build_router};
use crate::auth::{Accounts, Identity, JwtAuthority};
use crate::broker::Dispatcher;
use crate::config::UserAccount;
use crate::persistence::TelemetryStore;
use crate::simulator::{SimulatedVehicle, Simulator};
use crate::transport::message::ServerMessage;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::Duration;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::{TempDir, tempdir};
use tokio::sync::mpsc;
use tower::ServiceExt;
use tungstenite::protocol::Message as WsMessage;

const SECRET: &str = "http-test-secret";

struct TestApp {
    _dir: TempDir,
    state: AppState,
}

impl TestApp {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let store = TelemetryStore::open(dir.path().to_str().unwrap(), None, None).unwrap();
        store.register_vehicle("VEH2SDF33", "Camion 2").unwrap();

        let authority = JwtAuthority::new(SECRET, Duration::hours(1));
        let dispatcher = Dispatcher::new(authority.clone(), 10);
        let simulator = Simulator::new(
            store.clone(),
            dispatcher.clone(),
            vec![SimulatedVehicle::from_fleet("VEH2SDF33")],
            std::time::Duration::from_secs(60),
        );
        let state = AppState {
            dispatcher,
            store,
            authority,
            accounts: Accounts::new(vec![UserAccount {
                id: 1,
                email: "admin@demo.com".to_string(),
                password: "1234".to_string(),
                role: "admin".to_string(),
            }]),
            simulator,
        };
        Self { _dir: dir, state }
    }

    fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    fn token(&self) -> String {
        self.state
            .authority
            .issue(&Identity {
                id: 1,
                email: "admin@demo.com".to_string(),
                role: "admin".to_string(),
            })
            .unwrap()
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    request("GET", uri, token)
}

fn request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn next_frame(rx: &mut mpsc::UnboundedReceiver<WsMessage>) -> ServerMessage {
    match rx.try_recv().expect("expected a queued frame") {
        WsMessage::Text(text) => serde_json::from_str(&text).unwrap(),
        other => panic!("Expected a text message, got {other:?}"),
    }
}

#[tokio::test]
async fn login_issues_a_verifiable_token() {
    let app = TestApp::new();
    let response = app
        .router()
        .oneshot(post_json(
            "/api/login",
            None,
            json!({"correo": "admin@demo.com", "password": "1234"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let token = body["token"].as_str().unwrap();
    let identity = app.state.authority.verify(token).unwrap();
    assert_eq!(identity.email, "admin@demo.com");
}

#[tokio::test]
async fn login_rejects_wrong_password() {
    let app = TestApp::new();
    let response = app
        .router()
        .oneshot(post_json(
            "/api/login",
            None,
            json!({"correo": "admin@demo.com", "password": "nope"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let app = TestApp::new();

    let response = app
        .router()
        .oneshot(get("/api/ws/stats", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .router()
        .oneshot(get("/api/ws/stats", Some("not-a-jwt")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "FORBIDDEN");
}

#[tokio::test]
async fn ingest_stores_and_publishes_reading_and_alert() {
    let app = TestApp::new();
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
    let conn = app
        .state
        .dispatcher
        .admit(
            Identity {
                id: 7,
                email: "viewer@demo.com".to_string(),
                role: "viewer".to_string(),
            },
            Arc::new(tx),
        )
        .unwrap();
    next_frame(&mut rx);
    app.state.dispatcher.handle_text(
        &conn,
        &json!({"type": "subscribe", "vehicleId": "VEH2SDF33"}).to_string(),
    );
    next_frame(&mut rx);

    let token = app.token();
    let response = app
        .router()
        .oneshot(post_json(
            "/api/ingesta",
            Some(&token),
            json!({
                "vehiculo_id": "VEH2SDF33",
                "combustible": 8.0,
                "temperatura": 90.0,
                "velocidad": 60.0
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["data"]["estado"], "combustible_bajo");

    match next_frame(&mut rx) {
        ServerMessage::SensorData { vehicle_id, data, .. } => {
            assert_eq!(vehicle_id, "VEH2SDF33");
            assert_eq!(data["combustible"], 8.0);
        }
        other => panic!("Expected SensorData, got {other:?}"),
    }
    match next_frame(&mut rx) {
        ServerMessage::Alert { alert, .. } => assert_eq!(alert.tipo, "combustible_bajo"),
        other => panic!("Expected Alert, got {other:?}"),
    }
    assert!(rx.try_recv().is_err());

    assert_eq!(
        app.state.store.recent_readings("VEH2SDF33", 10).unwrap().len(),
        1
    );
}

#[tokio::test]
async fn normal_reading_publishes_no_alert() {
    let app = TestApp::new();
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
    let conn = app
        .state
        .dispatcher
        .admit(
            Identity {
                id: 7,
                email: "viewer@demo.com".to_string(),
                role: "viewer".to_string(),
            },
            Arc::new(tx),
        )
        .unwrap();
    next_frame(&mut rx);
    app.state.dispatcher.handle_text(
        &conn,
        &json!({"type": "subscribe", "vehicleId": "VEH2SDF33"}).to_string(),
    );
    next_frame(&mut rx);

    let token = app.token();
    let response = app
        .router()
        .oneshot(post_json(
            "/api/ingesta",
            Some(&token),
            json!({"vehiculo_id": "VEH2SDF33", "combustible": 60, "temperatura": 80}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert!(matches!(
        next_frame(&mut rx),
        ServerMessage::SensorData { .. }
    ));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn ingest_unknown_vehicle_is_not_found() {
    let app = TestApp::new();
    let token = app.token();
    let response = app
        .router()
        .oneshot(post_json(
            "/api/ingesta",
            Some(&token),
            json!({"vehiculo_id": "GHOST", "combustible": 50, "temperatura": 80}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}

#[tokio::test]
async fn ingest_rejects_invalid_reading() {
    let app = TestApp::new();
    let token = app.token();

    let response = app
        .router()
        .oneshot(post_json(
            "/api/ingesta",
            Some(&token),
            json!({"vehiculo_id": "VEH2SDF33", "combustible": 140, "temperatura": 80}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");

    let response = app
        .router()
        .oneshot(post_json(
            "/api/ingesta",
            Some(&token),
            json!({"vehiculo_id": "VEH2SDF33"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn sensor_data_and_stats_read_back_ingested_readings() {
    let app = TestApp::new();
    let token = app.token();

    for fuel in [40, 50, 60] {
        let response = app
            .router()
            .oneshot(post_json(
                "/api/ingesta",
                Some(&token),
                json!({"vehiculo_id": "VEH2SDF33", "combustible": fuel, "temperatura": 80}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .router()
        .oneshot(get("/api/sensores/VEH2SDF33?limit=2", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let response = app
        .router()
        .oneshot(get("/api/stats/VEH2SDF33", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["total_lecturas"], 3);
    assert_eq!(body["data"]["promedio_combustible"], 50.0);

    let response = app
        .router()
        .oneshot(get("/api/stats/GHOST", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn ws_stats_reports_dispatcher_state() {
    let app = TestApp::new();
    let (tx, _rx) = mpsc::unbounded_channel::<WsMessage>();
    let conn = app
        .state
        .dispatcher
        .admit(
            Identity {
                id: 3,
                email: "ops@demo.com".to_string(),
                role: "viewer".to_string(),
            },
            Arc::new(tx),
        )
        .unwrap();
    app.state.dispatcher.handle_text(
        &conn,
        &json!({"type": "subscribe", "vehicleId": "VEH2SDF33"}).to_string(),
    );

    let token = app.token();
    let response = app
        .router()
        .oneshot(get("/api/ws/stats", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["totalConnections"], 1);
    assert_eq!(body["data"]["totalTopics"], 1);
}

async fn ingest_ok(app: &TestApp, token: &str, body: Value) {
    let response = app
        .router()
        .oneshot(post_json("/api/ingesta", Some(token), body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn alerts_lists_only_out_of_range_readings() {
    let app = TestApp::new();
    let token = app.token();
    ingest_ok(
        &app,
        &token,
        json!({"vehiculo_id": "VEH2SDF33", "combustible": 5, "temperatura": 80}),
    )
    .await;
    ingest_ok(
        &app,
        &token,
        json!({"vehiculo_id": "VEH2SDF33", "combustible": 60, "temperatura": 80}),
    )
    .await;

    let response = app
        .router()
        .oneshot(get("/api/alerts/VEH2SDF33", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let alerts = body["data"].as_array().unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["estado"], "combustible_bajo");

    let response = app
        .router()
        .oneshot(get("/api/alerts/GHOST", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn vehicles_include_their_latest_reading() {
    let app = TestApp::new();
    app.state.store.register_vehicle("VH1ZU432E", "Camion 1").unwrap();
    let token = app.token();
    ingest_ok(
        &app,
        &token,
        json!({"vehiculo_id": "VEH2SDF33", "combustible": 70, "temperatura": 80}),
    )
    .await;

    let response = app
        .router()
        .oneshot(get("/api/vehicles", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let vehicles = body["data"].as_array().unwrap();
    assert_eq!(vehicles.len(), 2);

    // sled iterates keys in order
    assert_eq!(vehicles[0]["id"], "VEH2SDF33");
    assert_eq!(vehicles[0]["nombre"], "Camion 2");
    assert_eq!(vehicles[0]["ultima_lectura"]["combustible"], 70.0);
    assert_eq!(vehicles[1]["id"], "VH1ZU432E");
    assert!(vehicles[1]["ultima_lectura"].is_null());
}

#[tokio::test]
async fn malformed_query_and_path_get_json_errors() {
    let app = TestApp::new();
    let token = app.token();

    for uri in [
        "/api/sensores/VEH2SDF33?limit=abc",
        "/api/alerts/VEH2SDF33?limit=-1",
    ] {
        let response = app.router().oneshot(get(uri, Some(&token))).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        let body = body_json(response).await;
        assert_eq!(body["code"], "BAD_REQUEST");
        assert!(body["error"].is_string());
    }

    // percent-encoded invalid UTF-8 in the path
    let response = app
        .router()
        .oneshot(get("/api/stats/%FF", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn simulator_can_be_started_inspected_and_stopped() {
    let app = TestApp::new();
    let token = app.token();

    let response = app
        .router()
        .oneshot(get("/api/simulador/estado", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["isRunning"], false);
    assert_eq!(body["data"]["totalVehicles"], 1);

    let response = app
        .router()
        .oneshot(post_json(
            "/api/simulador/iniciar",
            Some(&token),
            json!({"intervalo": 60000}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["data"]["isRunning"], true);
    assert_eq!(body["data"]["intervalMs"], 60000);

    // no body: already running, keeps its interval
    let response = app
        .router()
        .oneshot(request("POST", "/api/simulador/iniciar", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["intervalMs"], 60000);

    let response = app
        .router()
        .oneshot(request("POST", "/api/simulador/detener", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["isRunning"], false);
    assert!(!app.state.simulator.status().is_running);
}

#[tokio::test]
async fn simulated_vehicles_can_be_added_and_removed() {
    let app = TestApp::new();
    let token = app.token();

    let response = app
        .router()
        .oneshot(post_json(
            "/api/simulador/vehiculos",
            Some(&token),
            json!({"vehicleId": "NEW1", "nombre": "Camion nuevo", "baseLat": 4.5}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["totalVehicles"], 2);
    assert_eq!(body["data"]["vehicles"][1]["baseLat"], 4.5);
    assert!(app.state.store.find_vehicle("NEW1").unwrap().is_some());

    let response = app
        .router()
        .oneshot(post_json(
            "/api/simulador/vehiculos",
            Some(&token),
            json!({"vehicleId": "NEW2", "nombre": " "}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .router()
        .oneshot(request(
            "DELETE",
            "/api/simulador/vehiculos/NEW1",
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["totalVehicles"], 1);

    let response = app
        .router()
        .oneshot(request(
            "DELETE",
            "/api/simulador/vehiculos/NEW1",
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}
