/*!
 * Name Server Configuration Tests
 */

use ipc_sync::config::{ENV_BIND_RETRY_CNT, ENV_MAX_PORT, ENV_MIN_PORT};
use ipc_sync::{ConfigError, NameServerConfig};
use pretty_assertions::assert_eq;
use serial_test::serial;
use std::io::Write;

fn clear_env() {
    for key in [ENV_MIN_PORT, ENV_MAX_PORT, ENV_BIND_RETRY_CNT] {
        std::env::remove_var(key);
    }
}

#[test]
#[serial]
fn test_from_env_defaults() {
    clear_env();
    let config = NameServerConfig::from_env().unwrap();
    assert_eq!(config, NameServerConfig::default());
}

#[test]
#[serial]
fn test_from_env_overrides() {
    clear_env();
    std::env::set_var(ENV_MIN_PORT, "50000");
    std::env::set_var(ENV_MAX_PORT, "50100");
    std::env::set_var(ENV_BIND_RETRY_CNT, " 9 ");

    let config = NameServerConfig::from_env().unwrap();
    clear_env();

    assert_eq!(config.min_port, 50000);
    assert_eq!(config.max_port, 50100);
    assert_eq!(config.bind_retry_count, 9);
    assert_eq!(
        config.name_server_tcp_url(false).unwrap(),
        "tcp://127.0.0.1:50002"
    );
}

#[test]
#[serial]
fn test_from_env_rejects_garbage() {
    clear_env();
    std::env::set_var(ENV_MIN_PORT, "not-a-port");

    let result = NameServerConfig::from_env();
    clear_env();

    match result {
        Err(ConfigError::InvalidValue { key, value }) => {
            assert_eq!(key, ENV_MIN_PORT);
            assert_eq!(value, "not-a-port");
        }
        other => panic!("expected InvalidValue, got {:?}", other),
    }
}

#[test]
#[serial]
fn test_from_env_rejects_inverted_range() {
    clear_env();
    std::env::set_var(ENV_MIN_PORT, "61000");
    std::env::set_var(ENV_MAX_PORT, "60000");

    let result = NameServerConfig::from_env();
    clear_env();

    assert!(matches!(result, Err(ConfigError::InvalidPortRange { .. })));
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"min_port": 40000, "max_port": 40010}}"#).unwrap();

    let config = NameServerConfig::load(file.path()).unwrap();
    assert_eq!(config.min_port, 40000);
    assert_eq!(config.max_port, 40010);
    // Missing fields take defaults
    assert_eq!(config.bind_retry_count, 5);
    assert_eq!(
        config.name_server_tcp_url(true).unwrap(),
        "tcps://127.0.0.1:40003"
    );
}

#[test]
fn test_load_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = NameServerConfig::load(dir.path().join("absent.json"));
    assert!(matches!(result, Err(ConfigError::Io(_))));
}

#[test]
fn test_parse_errors() {
    assert!(matches!(
        NameServerConfig::from_json_str("{ not json"),
        Err(ConfigError::Parse(_))
    ));
}

#[test]
fn test_range_too_narrow_for_name_server_ports() {
    let result = NameServerConfig::from_json_str(r#"{"min_port": 40000, "max_port": 40002}"#);
    assert!(matches!(
        result,
        Err(ConfigError::PortOutOfRange { offset: 3, .. })
    ));
}

#[test]
fn test_round_trips_through_json() {
    let config = NameServerConfig {
        min_port: 1000,
        max_port: 2000,
        bind_retry_count: 3,
    };
    let json = serde_json::to_string(&config).unwrap();
    assert_eq!(NameServerConfig::from_json_str(&json).unwrap(), config);
}
