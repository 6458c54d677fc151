//! Configuration loading and root folder resolution
//!
//! Resolution order for every setting:
//! 1. Command-line argument (highest priority; clap also folds in `PSR_*` env vars)
//! 2. Environment variable (root folder only, read here)
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::ids::Identity;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the data root folder
pub const ROOT_FOLDER_ENV: &str = "PSR_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "psr.db";

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5830;
pub const DEFAULT_EVENT_CAPACITY: usize = 1000;
pub const DEFAULT_AUTH_WINDOW_MS: i64 = crate::api::auth::DEFAULT_AUTH_WINDOW_MS;

/// Contents of `config.toml`; every key is optional
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    /// Authorized writer identity
    pub owner: Option<String>,
    pub bind_addr: Option<String>,
    pub port: Option<u16>,
    pub event_capacity: Option<usize>,
    pub auth_window_ms: Option<i64>,
    pub ephemeral: Option<bool>,
    /// Channel secret; overrides the value stored in the database
    pub shared_secret: Option<i64>,
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub root_folder: Option<PathBuf>,
    pub owner: Option<String>,
    pub bind_addr: Option<String>,
    pub port: Option<u16>,
    pub event_capacity: Option<usize>,
    pub auth_window_ms: Option<i64>,
    pub ephemeral: Option<bool>,
    pub shared_secret: Option<i64>,
}

/// Fully resolved registry configuration
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub root_folder: PathBuf,
    /// The single authorized writer, fixed for the process lifetime
    pub owner: Identity,
    pub bind_addr: String,
    pub port: u16,
    pub event_capacity: usize,
    pub auth_window_ms: i64,
    /// Keep records in memory only (no SQLite journal)
    pub ephemeral: bool,
    /// Explicit channel secret; `None` means load or generate it in the database
    pub shared_secret: Option<i64>,
}

impl RegistryConfig {
    /// Merge command-line overrides over the TOML file over defaults
    pub fn resolve(overrides: ConfigOverrides, file: TomlConfig) -> Result<Self> {
        let root_folder = resolve_root_folder(
            overrides.root_folder.as_deref(),
            ROOT_FOLDER_ENV,
            file.root_folder.as_deref(),
        );

        let owner_raw = overrides.owner.or(file.owner).ok_or_else(|| {
            Error::Config(
                "No authorized writer configured (set --owner, PSR_OWNER, or `owner` in config.toml)"
                    .to_string(),
            )
        })?;
        let owner = Identity::new(owner_raw)
            .map_err(|e| Error::Config(format!("Invalid owner identity: {}", e)))?;

        let event_capacity = overrides
            .event_capacity
            .or(file.event_capacity)
            .unwrap_or(DEFAULT_EVENT_CAPACITY);
        if event_capacity == 0 {
            return Err(Error::Config("event_capacity must be at least 1".to_string()));
        }

        let auth_window_ms = overrides
            .auth_window_ms
            .or(file.auth_window_ms)
            .unwrap_or(DEFAULT_AUTH_WINDOW_MS);
        if auth_window_ms <= 0 {
            return Err(Error::Config("auth_window_ms must be positive".to_string()));
        }

        let ephemeral = overrides.ephemeral.or(file.ephemeral).unwrap_or(false);
        let shared_secret = overrides.shared_secret.or(file.shared_secret);
        if ephemeral && shared_secret.is_none() {
            return Err(Error::Config(
                "ephemeral mode has no database to hold the API secret; set shared_secret"
                    .to_string(),
            ));
        }

        Ok(Self {
            root_folder,
            owner,
            bind_addr: overrides
                .bind_addr
                .or(file.bind_addr)
                .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            port: overrides.port.or(file.port).unwrap_or(DEFAULT_PORT),
            event_capacity,
            auth_window_ms,
            ephemeral,
            shared_secret,
        })
    }

    /// Path of the SQLite journal
    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE)
    }

    /// `host:port` string for binding the listener
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

/// Root folder resolution:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    config_file_value: Option<&Path>,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = config_file_value {
        return path.to_path_buf();
    }

    default_root_folder()
}

/// Load the TOML config file
///
/// An explicit path must exist and parse. Without one, the platform locations
/// are searched; finding nothing yields the defaults with a warning.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match find_config_file() {
            Some(path) => path,
            None => {
                warn!("No config.toml found, using command line and defaults only");
                return Ok(TomlConfig::default());
            }
        },
    };

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Cannot read {}: {}", path.display(), e)))?;
    let config = parse_toml_config(&content)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Parse TOML text into a [`TomlConfig`]
pub fn parse_toml_config(content: &str) -> std::result::Result<TomlConfig, toml::de::Error> {
    toml::from_str(content)
}

/// Platform config file locations, first existing wins
fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("psr").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(unix) {
        let system_config = PathBuf::from("/etc/psr/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("psr"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/psr"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("psr"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/psr"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("psr"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\psr"))
    } else {
        PathBuf::from("./psr_data")
    }
}
