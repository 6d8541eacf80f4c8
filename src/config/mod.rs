//! Configuration loading.
//!
//! Sources, lowest to highest precedence: built-in defaults, an optional
//! `config/default.toml`, then `TELEPUB_*` environment variables using `__`
//! between nesting levels (`TELEPUB_SERVER__WS_PORT=9001`).

mod settings;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{
    AuthSettings, DispatcherSettings, FleetSettings, ServerSettings, Settings, SimulatorSettings,
    StorageSettings, UserAccount,
};

pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix("TELEPUB")
                .prefix_separator("_")
                .separator("__"),
        );

    let config = builder.build()?;
    let settings = merge(config.try_deserialize()?);
    validate(&settings)?;
    Ok(settings)
}

/// Reject values that would only fail later, inside a running server.
fn validate(settings: &Settings) -> Result<(), ConfigError> {
    if settings.dispatcher.heartbeat_secs == 0 {
        return Err(ConfigError::Message(
            "dispatcher.heartbeat_secs must be greater than zero".to_string(),
        ));
    }
    if settings.simulator.interval_ms == 0 {
        return Err(ConfigError::Message(
            "simulator.interval_ms must be greater than zero".to_string(),
        ));
    }
    if !valid_ttl(settings.auth.token_ttl_secs) {
        return Err(ConfigError::Message(format!(
            "auth.token_ttl_secs out of range: {}",
            settings.auth.token_ttl_secs
        )));
    }
    if let Some(ttl) = settings.storage.ttl_secs.filter(|t| !valid_ttl(*t)) {
        return Err(ConfigError::Message(format!(
            "storage.ttl_secs out of range: {ttl}"
        )));
    }
    Ok(())
}

/// Positive and representable as a date offset from now.
fn valid_ttl(secs: i64) -> bool {
    secs > 0
        && chrono::Duration::try_seconds(secs)
            .and_then(|ttl| chrono::Utc::now().checked_add_signed(ttl))
            .is_some()
}

fn merge(partial: PartialSettings) -> Settings {
    let default = Settings::default();
    let server = partial.server;
    let auth = partial.auth;
    let dispatcher = partial.dispatcher;
    let storage = partial.storage;
    let simulator = partial.simulator;

    Settings {
        server: ServerSettings {
            host: server
                .as_ref()
                .and_then(|s| s.host.clone())
                .unwrap_or(default.server.host),
            ws_port: server
                .as_ref()
                .and_then(|s| s.ws_port)
                .unwrap_or(default.server.ws_port),
            http_port: server
                .as_ref()
                .and_then(|s| s.http_port)
                .unwrap_or(default.server.http_port),
        },
        auth: AuthSettings {
            jwt_secret: auth
                .as_ref()
                .and_then(|a| a.jwt_secret.clone())
                .unwrap_or(default.auth.jwt_secret),
            token_ttl_secs: auth
                .as_ref()
                .and_then(|a| a.token_ttl_secs)
                .unwrap_or(default.auth.token_ttl_secs),
            users: auth
                .and_then(|a| a.users)
                .unwrap_or(default.auth.users),
        },
        dispatcher: DispatcherSettings {
            max_connections: dispatcher
                .as_ref()
                .and_then(|d| d.max_connections)
                .unwrap_or(default.dispatcher.max_connections),
            heartbeat_secs: dispatcher
                .as_ref()
                .and_then(|d| d.heartbeat_secs)
                .unwrap_or(default.dispatcher.heartbeat_secs),
        },
        storage: StorageSettings {
            path: storage
                .as_ref()
                .and_then(|s| s.path.clone())
                .unwrap_or(default.storage.path),
            ttl_secs: storage
                .as_ref()
                .and_then(|s| s.ttl_secs)
                .or(default.storage.ttl_secs),
            max_readings_per_vehicle: storage
                .as_ref()
                .and_then(|s| s.max_readings_per_vehicle)
                .or(default.storage.max_readings_per_vehicle),
        },
        fleet: FleetSettings {
            vehicles: partial
                .fleet
                .and_then(|f| f.vehicles)
                .unwrap_or(default.fleet.vehicles),
        },
        simulator: SimulatorSettings {
            autostart: simulator
                .as_ref()
                .and_then(|s| s.autostart)
                .unwrap_or(default.simulator.autostart),
            interval_ms: simulator
                .as_ref()
                .and_then(|s| s.interval_ms)
                .unwrap_or(default.simulator.interval_ms),
        },
    }
}

#[cfg(test)]
mod tests;
