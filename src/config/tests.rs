use super::load_config;
use super::settings::Settings;
use serial_test::serial;
use std::env;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.server.host, "127.0.0.1");
    assert_eq!(settings.server.ws_port, 8080);
    assert_eq!(settings.server.http_port, 3000);
    assert_eq!(settings.dispatcher.max_connections, 1000);
    assert_eq!(settings.storage.ttl_secs, Some(86_400));
    assert_eq!(settings.auth.users.len(), 1);
    assert_eq!(settings.fleet.vehicles.len(), 3);
    assert!(!settings.simulator.autostart);
    assert_eq!(settings.simulator.interval_ms, 5000);
}

#[test]
#[serial]
fn load_config_from_file_overrides_defaults() {
    // load_config reads config/default.toml relative to the cwd
    let tmp = TempDir::new().expect("create tempdir");
    let orig = env::current_dir().expect("current_dir");
    env::set_current_dir(tmp.path()).expect("set current dir");

    fs::create_dir_all("config").expect("create config dir");
    let toml = r#"
        [server]
        host = "0.0.0.0"
        ws_port = 9000

        [auth]
        jwt_secret = "file_secret"

        [[auth.users]]
        id = 7
        email = "ops@fleet.test"
        password = "pw"
        role = "operator"

        [fleet]
        vehicles = ["TRUCK-1"]
    "#;
    fs::write("config/default.toml", toml).expect("write config file");

    let cfg = load_config();
    env::set_current_dir(orig).expect("restore cwd");
    let cfg = cfg.expect("load_config failed");

    assert_eq!(cfg.server.host, "0.0.0.0");
    assert_eq!(cfg.server.ws_port, 9000);
    // untouched keys keep their defaults
    assert_eq!(cfg.server.http_port, 3000);
    assert_eq!(cfg.auth.jwt_secret, "file_secret");
    assert_eq!(cfg.auth.token_ttl_secs, 3600);
    assert_eq!(cfg.auth.users.len(), 1);
    assert_eq!(cfg.auth.users[0].email, "ops@fleet.test");
    assert_eq!(cfg.fleet.vehicles, vec!["TRUCK-1".to_string()]);
}

#[test]
#[serial]
fn environment_overrides_defaults() {
    temp_env::with_vars(
        [
            ("TELEPUB_SERVER__HTTP_PORT", Some("4100")),
            ("TELEPUB_DISPATCHER__MAX_CONNECTIONS", Some("5")),
            ("TELEPUB_AUTH__JWT_SECRET", Some("env_secret")),
        ],
        || {
            let cfg = load_config().expect("load_config failed");
            assert_eq!(cfg.server.http_port, 4100);
            assert_eq!(cfg.dispatcher.max_connections, 5);
            assert_eq!(cfg.auth.jwt_secret, "env_secret");
            assert_eq!(cfg.server.ws_port, 8080);
        },
    );
}

#[test]
#[serial]
fn zero_heartbeat_is_rejected() {
    temp_env::with_var("TELEPUB_DISPATCHER__HEARTBEAT_SECS", Some("0"), || {
        let err = load_config().expect_err("zero heartbeat must not load");
        assert!(err.to_string().contains("heartbeat_secs"), "got {err}");
    });
}

#[test]
#[serial]
fn out_of_range_ttls_are_rejected() {
    temp_env::with_var(
        "TELEPUB_AUTH__TOKEN_TTL_SECS",
        Some("9223372036854775807"),
        || {
            let err = load_config().expect_err("huge token ttl must not load");
            assert!(err.to_string().contains("token_ttl_secs"), "got {err}");
        },
    );
    temp_env::with_var("TELEPUB_STORAGE__TTL_SECS", Some("-5"), || {
        let err = load_config().expect_err("negative storage ttl must not load");
        assert!(err.to_string().contains("storage.ttl_secs"), "got {err}");
    });
}

#[test]
#[serial]
fn simulator_settings_merge_over_defaults() {
    temp_env::with_var("TELEPUB_SIMULATOR__INTERVAL_MS", Some("250"), || {
        let cfg = load_config().expect("load_config failed");
        assert_eq!(cfg.simulator.interval_ms, 250);
        assert!(!cfg.simulator.autostart);
    });
}
