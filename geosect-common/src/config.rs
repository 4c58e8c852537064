//! Bootstrap configuration and root folder resolution
//!
//! Resolution priority for every setting:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (root folder only; other flags read their env through clap)
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing or unreadable TOML file never prevents startup: the loader falls
//! back to defaults and records the problem in [`ServiceConfig::source`].

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "GEOSECT_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "geosect.db";

/// Export artifact directory inside the root folder
pub const EXPORTS_DIR: &str = "exports";

/// Built-in defaults used when neither CLI, environment nor TOML set a value
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub port: u16,
    pub bind_address: String,
    pub log_level: String,
    pub max_upload_bytes: usize,
    pub database_max_lock_wait_ms: u64,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            port: 5730,
            bind_address: "127.0.0.1".to_string(),
            log_level: "info".to_string(),
            max_upload_bytes: 16 * 1024 * 1024,
            database_max_lock_wait_ms: 5000,
        }
    }
}

/// OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("geosect"))
        .unwrap_or_else(|| PathBuf::from("./geosect_data"))
}

/// Default location of the TOML file (`<config_dir>/geosect/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("geosect").join("config.toml"))
}

/// Logging section of the TOML file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Log level directive (trace, debug, info, warn, error)
    #[serde(default)]
    pub level: Option<String>,
}

/// Contents of the TOML bootstrap file; every key is optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub root_folder: Option<PathBuf>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub bind_address: Option<String>,
    #[serde(default)]
    pub max_upload_bytes: Option<usize>,
    #[serde(default)]
    pub database_max_lock_wait_ms: Option<u64>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Parse a TOML bootstrap file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML {} failed: {}", path.display(), e)))
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub root_folder: Option<PathBuf>,
    pub port: Option<u16>,
    pub bind_address: Option<String>,
    pub config_path: Option<PathBuf>,
}

/// Where the TOML layer of a [`ServiceConfig`] came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// No file was found; TOML layer empty
    Defaults,
    /// Parsed from this file
    File(PathBuf),
    /// A file was requested or present but could not be used
    Unreadable { path: PathBuf, reason: String },
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub source: ConfigSource,
    pub root_folder: PathBuf,
    pub port: u16,
    pub bind_address: String,
    pub log_level: String,
    pub max_upload_bytes: usize,
    pub database_max_lock_wait_ms: u64,
}

impl ServiceConfig {
    /// Load the TOML file (explicit path or platform default) and merge with CLI values
    ///
    /// A file that is missing or cannot be parsed is not fatal: the service
    /// starts on defaults and `source` records what happened so the caller can
    /// report it once logging is up.
    pub fn load(overrides: &CliOverrides) -> Self {
        let path = overrides.config_path.clone().or_else(default_config_path);
        let (toml, source) = match path {
            Some(p) if p.exists() => match load_toml_config(&p) {
                Ok(cfg) => (cfg, ConfigSource::File(p)),
                Err(e) => (
                    TomlConfig::default(),
                    ConfigSource::Unreadable {
                        path: p,
                        reason: e.to_string(),
                    },
                ),
            },
            Some(p) if overrides.config_path.is_some() => (
                TomlConfig::default(),
                ConfigSource::Unreadable {
                    path: p,
                    reason: "file not found".to_string(),
                },
            ),
            _ => (TomlConfig::default(), ConfigSource::Defaults),
        };

        Self {
            source,
            ..Self::resolve(overrides, toml)
        }
    }

    /// Log where the configuration came from
    pub fn log_source(&self) {
        match &self.source {
            ConfigSource::Defaults => info!("No config file found, using defaults"),
            ConfigSource::File(path) => info!("Loaded configuration from {}", path.display()),
            ConfigSource::Unreadable { path, reason } => warn!(
                "Config file {} unusable ({}), continuing with defaults",
                path.display(),
                reason
            ),
        }
    }

    /// Merge CLI, environment, TOML and compiled defaults
    pub fn resolve(overrides: &CliOverrides, toml: TomlConfig) -> Self {
        let defaults = CompiledDefaults::for_current_platform();

        let root_folder = overrides
            .root_folder
            .clone()
            .or_else(|| std::env::var(ROOT_FOLDER_ENV).ok().filter(|v| !v.trim().is_empty()).map(PathBuf::from))
            .or(toml.root_folder)
            .unwrap_or(defaults.root_folder);

        Self {
            source: ConfigSource::Defaults,
            root_folder,
            port: overrides.port.or(toml.port).unwrap_or(defaults.port),
            bind_address: overrides
                .bind_address
                .clone()
                .or(toml.bind_address)
                .unwrap_or(defaults.bind_address),
            log_level: toml.logging.level.unwrap_or(defaults.log_level),
            max_upload_bytes: toml.max_upload_bytes.unwrap_or(defaults.max_upload_bytes),
            database_max_lock_wait_ms: toml
                .database_max_lock_wait_ms
                .unwrap_or(defaults.database_max_lock_wait_ms),
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE)
    }

    pub fn exports_dir(&self) -> PathBuf {
        self.root_folder.join(EXPORTS_DIR)
    }

    /// Create the root folder and export directory if missing
    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root_folder)?;
        std::fs::create_dir_all(self.exports_dir())?;
        Ok(())
    }

    /// `host:port` string for the listener
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}
