use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub auth: AuthSettings,
    pub dispatcher: DispatcherSettings,
    pub storage: StorageSettings,
    pub fleet: FleetSettings,
    pub simulator: SimulatorSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub ws_port: u16,
    pub http_port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub token_ttl_secs: i64,
    pub users: Vec<UserAccount>,
}

/// A login account accepted by `POST /api/login`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct UserAccount {
    pub id: i64,
    pub email: String,
    pub password: String,
    pub role: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DispatcherSettings {
    pub max_connections: usize,
    pub heartbeat_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageSettings {
    pub path: String,
    pub ttl_secs: Option<i64>,
    pub max_readings_per_vehicle: Option<usize>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FleetSettings {
    /// External ids of the vehicles accepted by ingestion.
    pub vehicles: Vec<String>,
}

/// Built-in reading generator for demos.
#[derive(Debug, Deserialize, Clone)]
pub struct SimulatorSettings {
    /// Start generating as soon as the server is up.
    pub autostart: bool,
    pub interval_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub auth: Option<PartialAuthSettings>,
    pub dispatcher: Option<PartialDispatcherSettings>,
    pub storage: Option<PartialStorageSettings>,
    pub fleet: Option<PartialFleetSettings>,
    pub simulator: Option<PartialSimulatorSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub ws_port: Option<u16>,
    pub http_port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct PartialAuthSettings {
    pub jwt_secret: Option<String>,
    pub token_ttl_secs: Option<i64>,
    pub users: Option<Vec<UserAccount>>,
}

#[derive(Debug, Deserialize)]
pub struct PartialDispatcherSettings {
    pub max_connections: Option<usize>,
    pub heartbeat_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialStorageSettings {
    pub path: Option<String>,
    pub ttl_secs: Option<i64>,
    pub max_readings_per_vehicle: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PartialFleetSettings {
    pub vehicles: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct PartialSimulatorSettings {
    pub autostart: Option<bool>,
    pub interval_ms: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                ws_port: 8080,
                http_port: 3000,
            },
            auth: AuthSettings {
                jwt_secret: "change-me".to_string(),
                token_ttl_secs: 3600,
                users: vec![UserAccount {
                    id: 1,
                    email: "admin@demo.com".to_string(),
                    password: "1234".to_string(),
                    role: "admin".to_string(),
                }],
            },
            dispatcher: DispatcherSettings {
                max_connections: 1000,
                heartbeat_secs: 30,
            },
            storage: StorageSettings {
                path: "telemetry_db".to_string(),
                ttl_secs: Some(86_400), // 24h, matches the stats window
                max_readings_per_vehicle: Some(1000),
            },
            fleet: FleetSettings {
                vehicles: vec![
                    "VH1ZU432E".to_string(),
                    "VEH2SDF33".to_string(),
                    "VEH334345SDF".to_string(),
                ],
            },
            simulator: SimulatorSettings {
                autostart: false,
                interval_ms: 5000,
            },
        }
    }
}
