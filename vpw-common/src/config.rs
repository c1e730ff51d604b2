//! Configuration loading and root folder resolution
//!
//! Bootstrap settings come from an optional TOML file. A missing or broken
//! file never prevents startup: a warning is logged and built-in defaults are
//! used instead.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::{Error, Result};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "VPW_ROOT_FOLDER";
/// Environment variable overriding the Idaho endpoint
pub const IDAHO_ENDPOINT_ENV: &str = "VPW_IDAHO_ENDPOINT";
/// Environment variable overriding the California proxy address
pub const CALIFORNIA_PROXY_ENV: &str = "VPW_CALIFORNIA_PROXY";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "vpw.db";
/// JSON store file name inside the root folder
pub const JSON_STORE_FILE: &str = "plates.json";

const DEFAULT_IDAHO_ENDPOINT: &str =
    "https://services.itd.idaho.gov/PersonalizedPlates/api/availability";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder for the database / JSON store (optional)
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub availability: AvailabilityConfig,

    #[serde(default)]
    pub http: HttpConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Which medium holds the persisted plate collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// `settings` table row in the SQLite database
    #[default]
    Sqlite,
    /// Standalone JSON file
    Json,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

/// Remote availability service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityConfig {
    #[serde(default = "default_idaho_endpoint")]
    pub idaho_endpoint: String,

    /// California lookups go through a proxy; unset means CA is unconfigured
    #[serde(default)]
    pub california_proxy: Option<String>,

    /// Pause between consecutive remote checks in a refresh run
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for AvailabilityConfig {
    fn default() -> Self {
        Self {
            idaho_endpoint: default_idaho_endpoint(),
            california_proxy: None,
            request_delay_ms: default_request_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl AvailabilityConfig {
    /// Apply `VPW_IDAHO_ENDPOINT` / `VPW_CALIFORNIA_PROXY` if set and non-blank
    pub fn apply_env_overrides(&mut self) {
        if let Some(endpoint) = non_blank_env(IDAHO_ENDPOINT_ENV) {
            info!("Idaho endpoint overridden from {}", IDAHO_ENDPOINT_ENV);
            self.idaho_endpoint = endpoint;
        }
        if let Some(proxy) = non_blank_env(CALIFORNIA_PROXY_ENV) {
            info!("California proxy overridden from {}", CALIFORNIA_PROXY_ENV);
            self.california_proxy = Some(proxy);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_idaho_endpoint() -> String {
    DEFAULT_IDAHO_ENDPOINT.to_string()
}

fn default_request_delay_ms() -> u64 {
    1500
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_port() -> u16 {
    5790
}

fn non_blank_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Default TOML location: `<config_dir>/vpw/<module>.toml`
pub fn default_config_path(module_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("vpw").join(format!("{}.toml", module_name)))
}

/// Parse a TOML config file
pub fn read_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))
}

/// Where the bootstrap config came from
///
/// Returned by [`load_toml_config`] so the outcome can be logged once the
/// tracing subscriber (whose level comes from this config) is installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Parsed from this file
    File(PathBuf),
    /// No platform config directory; defaults used
    NoConfigDir,
    /// Nothing at the default location; defaults used
    DefaultPathMissing(PathBuf),
    /// `--config` named a file that does not exist; defaults used
    ExplicitPathMissing(PathBuf),
    /// File exists but could not be read or parsed; defaults used
    Unreadable { path: PathBuf, error: String },
}

impl ConfigSource {
    /// True when built-in defaults replaced a config the user asked for
    pub fn is_fallback(&self) -> bool {
        matches!(
            self,
            ConfigSource::ExplicitPathMissing(_) | ConfigSource::Unreadable { .. }
        )
    }

    /// Report the outcome; a missing default file is normal and only info
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("Loaded config from {}", path.display()),
            ConfigSource::NoConfigDir => {
                warn!("Could not determine config directory, using defaults")
            }
            ConfigSource::DefaultPathMissing(path) => {
                info!("No config file at {}, using defaults", path.display())
            }
            ConfigSource::ExplicitPathMissing(path) => {
                warn!("Config file {} not found, using defaults", path.display())
            }
            ConfigSource::Unreadable { error, .. } => warn!("{}; using defaults", error),
        }
    }
}

/// Load TOML config, falling back to defaults on any problem
///
/// Logs nothing itself; call [`ConfigSource::log`] on the returned source.
pub fn load_toml_config(explicit: Option<&Path>, module_name: &str) -> (TomlConfig, ConfigSource) {
    let (path, explicit) = match explicit {
        Some(p) => (p.to_path_buf(), true),
        None => match default_config_path(module_name) {
            Some(p) => (p, false),
            None => return (TomlConfig::default(), ConfigSource::NoConfigDir),
        },
    };

    if !path.exists() {
        let source = if explicit {
            ConfigSource::ExplicitPathMissing(path)
        } else {
            ConfigSource::DefaultPathMissing(path)
        };
        return (TomlConfig::default(), source);
    }

    match read_toml_config(&path) {
        Ok(config) => (config, ConfigSource::File(path)),
        Err(e) => (
            TomlConfig::default(),
            ConfigSource::Unreadable {
                path,
                error: e.to_string(),
            },
        ),
    }
}

/// Root folder resolution, highest priority first:
/// 1. Command-line argument
/// 2. `VPW_ROOT_FOLDER` environment variable
/// 3. TOML `root_folder`
/// 4. OS-dependent default
pub struct RootFolderResolver {
    cli_override: Option<PathBuf>,
    toml_root: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(cli_override: Option<PathBuf>, config: &TomlConfig) -> Self {
        Self {
            cli_override,
            toml_root: config.root_folder.clone(),
        }
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_override {
            return path.clone();
        }
        if let Some(path) = non_blank_env(ROOT_FOLDER_ENV) {
            return PathBuf::from(path);
        }
        if let Some(path) = &self.toml_root {
            return path.clone();
        }
        default_root_folder()
    }
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("vpw"))
        .unwrap_or_else(|| PathBuf::from("./vpw_data"))
}

/// Creates the root folder and names the files inside it
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            info!("Created root folder: {}", self.root_folder.display());
        }
        Ok(())
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE)
    }

    pub fn json_store_path(&self) -> PathBuf {
        self.root_folder.join(JSON_STORE_FILE)
    }
}
