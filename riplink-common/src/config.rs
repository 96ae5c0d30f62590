//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "RIPLINK_ROOT_FOLDER";

/// Name of the SQLite database created inside the root folder
pub const DATABASE_FILE_NAME: &str = "riplink.db";

/// TOML configuration file contents
///
/// Every section is optional; missing values fall back to the defaults below.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the state database
    pub root_folder: Option<String>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub catalog: EndpointConfig,
    #[serde(default)]
    pub notifier: EndpointConfig,
}

/// Logging section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "riplink=info,tower_http=info".to_string(),
        }
    }
}

/// Filesystem layout of rips and link outputs
///
/// Release ids (plus an optional `_<disk>` suffix) are joined onto these.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding one sub-directory per ripped disk
    pub rip_dir: String,
    /// Output directory for linked and tagged MP3 files
    pub mp3_dir: String,
    /// Output directory for linked and tagged FLAC files
    pub flac_dir: String,
    /// Top-level entry in the rip directory that is never a rip
    pub recovery_dir_name: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            rip_dir: "/media/music/rips/".to_string(),
            mp3_dir: "/media/music/mp3/".to_string(),
            flac_dir: "/media/music/flac/".to_string(),
            recovery_dir_name: "lost+found".to_string(),
        }
    }
}

/// HTTP service and scheduler section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub bind_address: String,
    pub port: u16,
    /// Seconds between reconciliation cycles
    pub cycle_interval_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 5731,
            cycle_interval_secs: 3600,
        }
    }
}

/// Remote collaborator endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            timeout_ms: 5000,
        }
    }
}

/// Root folder resolution, in priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&str>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.root_folder {
        return PathBuf::from(path);
    }

    get_default_root_folder()
}

/// Locate the configuration file for this platform
///
/// An explicit path wins; otherwise the user config directory is tried
/// before the system-wide location.
pub fn config_file_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return if path.exists() {
            Ok(path.to_path_buf())
        } else {
            Err(Error::Config(format!("Config file not found: {:?}", path)))
        };
    }

    let user_config = dirs::config_dir().map(|d| d.join("riplink").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Ok(path);
        }
    }

    let system_config = PathBuf::from("/etc/riplink/config.toml");
    if system_config.exists() {
        return Ok(system_config);
    }

    Err(Error::Config("No config file found".to_string()))
}

/// Parse a TOML configuration file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Load the configuration file if one can be found, defaults otherwise
pub fn load_or_default(explicit: Option<&Path>) -> Result<TomlConfig> {
    match config_file_path(explicit) {
        Ok(path) => load_toml_config(&path),
        Err(e) if explicit.is_none() => {
            debug!("Using default configuration: {}", e);
            Ok(TomlConfig::default())
        }
        Err(e) => Err(e),
    }
}

/// Path of the state database inside a root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DATABASE_FILE_NAME)
}

/// Get OS-dependent default root folder path
fn get_default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/riplink (or /var/lib/riplink for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("riplink"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/riplink"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("riplink"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/riplink"))
    } else {
        PathBuf::from("./riplink_data")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn test_cli_arg_wins() {
        std::env::set_var(ROOT_FOLDER_ENV, "/from/env");
        let config = TomlConfig {
            root_folder: Some("/from/toml".to_string()),
            ..Default::default()
        };

        let resolved = resolve_root_folder(Some("/from/cli"), &config);
        assert_eq!(resolved, PathBuf::from("/from/cli"));

        std::env::remove_var(ROOT_FOLDER_ENV);
    }

    #[test]
    #[serial]
    fn test_env_beats_toml() {
        std::env::set_var(ROOT_FOLDER_ENV, "/from/env");
        let config = TomlConfig {
            root_folder: Some("/from/toml".to_string()),
            ..Default::default()
        };

        assert_eq!(resolve_root_folder(None, &config), PathBuf::from("/from/env"));

        std::env::remove_var(ROOT_FOLDER_ENV);
    }

    #[test]
    #[serial]
    fn test_toml_used_without_env() {
        std::env::remove_var(ROOT_FOLDER_ENV);
        let config = TomlConfig {
            root_folder: Some("/from/toml".to_string()),
            ..Default::default()
        };

        assert_eq!(resolve_root_folder(None, &config), PathBuf::from("/from/toml"));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[paths]\nrip_dir = \"/rips/\"\nmp3_dir = \"/mp3/\"\nflac_dir = \"/flac/\"\nrecovery_dir_name = \"lost+found\"\n",
        )
        .unwrap();

        let config = load_toml_config(&path).unwrap();
        assert_eq!(config.paths.rip_dir, "/rips/");
        assert_eq!(config.service.port, 5731);
        assert_eq!(config.catalog.timeout_ms, 5000);
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let result = load_or_default(Some(Path::new("/definitely/not/here.toml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
