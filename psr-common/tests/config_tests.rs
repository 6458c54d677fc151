//! Tests for configuration resolution
//!
//! Tests that manipulate PSR_ROOT_FOLDER are marked #[serial] so they do not
//! race each other on the process environment.

use psr_common::config::{
    parse_toml_config, resolve_root_folder, ConfigOverrides, RegistryConfig, TomlConfig,
    DEFAULT_AUTH_WINDOW_MS, DEFAULT_EVENT_CAPACITY, DEFAULT_PORT, ROOT_FOLDER_ENV,
};
use psr_common::Error;
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};

fn owner_only() -> ConfigOverrides {
    ConfigOverrides {
        owner: Some("scoring-pipeline".to_string()),
        root_folder: Some(PathBuf::from("/tmp/psr-config-test")),
        ..Default::default()
    }
}

#[test]
fn test_defaults_applied() {
    let config = RegistryConfig::resolve(owner_only(), TomlConfig::default()).unwrap();

    assert_eq!(config.owner.as_str(), "scoring-pipeline");
    assert_eq!(config.bind_addr, "127.0.0.1");
    assert_eq!(config.port, DEFAULT_PORT);
    assert_eq!(config.event_capacity, DEFAULT_EVENT_CAPACITY);
    assert_eq!(config.auth_window_ms, DEFAULT_AUTH_WINDOW_MS);
    assert!(!config.ephemeral);
    assert_eq!(config.shared_secret, None);
    assert_eq!(
        config.database_path(),
        PathBuf::from("/tmp/psr-config-test/psr.db")
    );
    assert_eq!(config.listen_addr(), format!("127.0.0.1:{}", DEFAULT_PORT));
}

#[test]
fn test_missing_owner_is_config_error() {
    let overrides = ConfigOverrides {
        root_folder: Some(PathBuf::from("/tmp/psr-config-test")),
        ..Default::default()
    };

    let err = RegistryConfig::resolve(overrides, TomlConfig::default()).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn test_blank_owner_rejected() {
    let overrides = ConfigOverrides {
        owner: Some("   ".to_string()),
        root_folder: Some(PathBuf::from("/tmp/psr-config-test")),
        ..Default::default()
    };

    assert!(RegistryConfig::resolve(overrides, TomlConfig::default()).is_err());
}

#[test]
fn test_cli_overrides_toml() {
    let file = parse_toml_config(
        r#"
        owner = "file-owner"
        port = 7000
        bind_addr = "0.0.0.0"
        ephemeral = true
        shared_secret = 42
        "#,
    )
    .unwrap();

    let overrides = ConfigOverrides {
        owner: Some("cli-owner".to_string()),
        port: Some(7100),
        root_folder: Some(PathBuf::from("/tmp/psr-config-test")),
        ..Default::default()
    };

    let config = RegistryConfig::resolve(overrides, file).unwrap();
    assert_eq!(config.owner.as_str(), "cli-owner");
    assert_eq!(config.port, 7100);
    // Not overridden: falls through to the file
    assert_eq!(config.bind_addr, "0.0.0.0");
    assert!(config.ephemeral);
    assert_eq!(config.shared_secret, Some(42));
}

#[test]
fn test_ephemeral_without_secret_rejected() {
    let mut overrides = owner_only();
    overrides.ephemeral = Some(true);

    let err = RegistryConfig::resolve(overrides, TomlConfig::default()).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn test_toml_supplies_owner() {
    let file = parse_toml_config(r#"owner = "file-owner""#).unwrap();
    let overrides = ConfigOverrides {
        root_folder: Some(PathBuf::from("/tmp/psr-config-test")),
        ..Default::default()
    };

    let config = RegistryConfig::resolve(overrides, file).unwrap();
    assert_eq!(config.owner.as_str(), "file-owner");
}

#[test]
fn test_unknown_toml_key_rejected() {
    assert!(parse_toml_config(r#"ownr = "typo""#).is_err());
}

#[test]
fn test_zero_event_capacity_rejected() {
    let mut overrides = owner_only();
    overrides.event_capacity = Some(0);
    assert!(RegistryConfig::resolve(overrides, TomlConfig::default()).is_err());
}

#[test]
fn test_non_positive_auth_window_rejected() {
    let mut overrides = owner_only();
    overrides.auth_window_ms = Some(0);
    assert!(RegistryConfig::resolve(overrides, TomlConfig::default()).is_err());
}

#[test]
#[serial]
fn test_root_folder_cli_beats_env() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/psr-from-env");

    let resolved = resolve_root_folder(
        Some(Path::new("/tmp/psr-from-cli")),
        ROOT_FOLDER_ENV,
        Some(Path::new("/tmp/psr-from-file")),
    );
    assert_eq!(resolved, PathBuf::from("/tmp/psr-from-cli"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_root_folder_env_beats_file() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/psr-from-env");

    let resolved = resolve_root_folder(None, ROOT_FOLDER_ENV, Some(Path::new("/tmp/psr-from-file")));
    assert_eq!(resolved, PathBuf::from("/tmp/psr-from-env"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_root_folder_file_then_default() {
    env::remove_var(ROOT_FOLDER_ENV);

    let from_file =
        resolve_root_folder(None, ROOT_FOLDER_ENV, Some(Path::new("/tmp/psr-from-file")));
    assert_eq!(from_file, PathBuf::from("/tmp/psr-from-file"));

    let fallback = resolve_root_folder(None, ROOT_FOLDER_ENV, None);
    assert_eq!(fallback, psr_common::config::default_root_folder());
    assert!(!fallback.as_os_str().is_empty());
}

#[test]
fn test_load_explicit_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "owner = \"scoring-pipeline\"\nevent_capacity = 64\n").unwrap();

    let file = psr_common::config::load_toml_config(Some(&path)).unwrap();
    assert_eq!(file.owner.as_deref(), Some("scoring-pipeline"));
    assert_eq!(file.event_capacity, Some(64));
}

#[test]
fn test_load_missing_explicit_config_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");

    let err = psr_common::config::load_toml_config(Some(&path)).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}
