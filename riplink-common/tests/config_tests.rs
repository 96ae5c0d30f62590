//! Configuration loading and root folder resolution
//!
//! Tests that touch RIPLINK_ROOT_FOLDER are marked #[serial] so they never
//! race each other.

use riplink_common::config::{
    database_path, load_or_default, load_toml_config, resolve_root_folder, TomlConfig,
    DATABASE_FILE_NAME, ROOT_FOLDER_ENV,
};
use serial_test::serial;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[test]
fn test_defaults_without_config_file() {
    let config = TomlConfig::default();
    assert!(config.root_folder.is_none());
    assert_eq!(config.paths.recovery_dir_name, "lost+found");
    assert_eq!(config.service.cycle_interval_secs, 3600);
    assert!(config.logging.level.contains("riplink=info"));
}

#[test]
fn test_full_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
root_folder = "/srv/riplink"

[logging]
level = "riplink=debug"

[paths]
rip_dir = "/rips/"
mp3_dir = "/mp3/"
flac_dir = "/flac/"

[service]
port = 7000

[catalog]
base_url = "http://catalog:9000"

[notifier]
base_url = "http://issues:9100"
timeout_ms = 250
"#,
    )
    .unwrap();

    let config = load_toml_config(&path).unwrap();
    assert_eq!(config.root_folder.as_deref(), Some("/srv/riplink"));
    assert_eq!(config.logging.level, "riplink=debug");
    assert_eq!(config.paths.mp3_dir, "/mp3/");
    assert_eq!(config.paths.recovery_dir_name, "lost+found");
    assert_eq!(config.service.port, 7000);
    assert_eq!(config.service.bind_address, "127.0.0.1");
    assert_eq!(config.catalog.base_url, "http://catalog:9000");
    assert_eq!(config.catalog.timeout_ms, 5000);
    assert_eq!(config.notifier.timeout_ms, 250);
}

#[test]
fn test_malformed_file_is_config_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[service]\nport = \"not a port\"\n").unwrap();

    let result = load_or_default(Some(path.as_path()));
    assert!(matches!(result, Err(riplink_common::Error::Config(_))));
}

#[test]
#[serial]
fn test_blank_env_falls_through_to_toml() {
    std::env::set_var(ROOT_FOLDER_ENV, "  ");
    let config = TomlConfig {
        root_folder: Some("/from/toml".to_string()),
        ..Default::default()
    };

    assert_eq!(resolve_root_folder(None, &config), PathBuf::from("/from/toml"));

    std::env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_compiled_default_when_nothing_set() {
    std::env::remove_var(ROOT_FOLDER_ENV);
    let resolved = resolve_root_folder(None, &TomlConfig::default());
    assert!(!resolved.as_os_str().is_empty());
    assert!(resolved.ends_with("riplink") || resolved.ends_with("riplink_data"));
}

#[test]
fn test_database_lives_in_root_folder() {
    assert_eq!(
        database_path(Path::new("/srv/riplink")),
        PathBuf::from("/srv/riplink").join(DATABASE_FILE_NAME)
    );
}
