//! Configuration
//!
//! A TOML file with `[storage]`, `[api]`, `[tandem]` and `[logging]`
//! sections; every field has a default and `BOLUS_*` environment variables
//! override the file.
//! t:connect credentials are never read from the file; see
//! [`TandemLogin`](crate::tandem::TandemLogin).

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub tandem: TandemConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Event store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

fn default_database_path() -> String {
    dirs::data_local_dir()
        .map(|p| {
            p.join("bolus-history")
                .join("history.db")
                .to_string_lossy()
                .to_string()
        })
        .unwrap_or_else(|| "./bolus_history.db".to_string())
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

impl StorageConfig {
    /// Database path with a leading `~/` expanded to the home directory
    pub fn path(&self) -> PathBuf {
        match (self.database_path.strip_prefix("~/"), dirs::home_dir()) {
            (Some(rest), Some(home)) => home.join(rest),
            _ => PathBuf::from(&self.database_path),
        }
    }
}

/// API server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub cors_origins: Vec<String>,

    #[serde(default = "default_max_body")]
    pub max_body_size: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8090
}

fn default_max_body() -> usize {
    20 * 1024 * 1024 // a few weeks of therapy events
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
            max_body_size: default_max_body(),
        }
    }
}

impl ApiConfig {
    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// t:connect API endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct TandemConfig {
    #[serde(default = "default_tandem_url")]
    pub base_url: String,

    #[serde(default = "default_login_url")]
    pub login_url: String,

    #[serde(default = "default_tandem_timeout")]
    pub request_timeout_secs: u64,
}

fn default_tandem_url() -> String {
    "https://tdcservices.tandemdiabetes.com".to_string()
}

fn default_login_url() -> String {
    "https://tdcservices.tandemdiabetes.com/accounts/api/login".to_string()
}

fn default_tandem_timeout() -> u64 {
    60
}

impl Default for TandemConfig {
    fn default() -> Self {
        Self {
            base_url: default_tandem_url(),
            login_url: default_login_url(),
            request_timeout_secs: default_tandem_timeout(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| match e {
            ConfigError::Parse { error, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                error,
            },
            other => other,
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            error: e.to_string(),
        })
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("bolus-history").join("config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("BOLUS_DATABASE") {
            self.storage.database_path = path;
        }

        if let Some(host) = lookup("BOLUS_API_HOST") {
            self.api.host = host;
        }
        if let Some(port) = lookup("BOLUS_API_PORT") {
            match port.parse() {
                Ok(p) => self.api.port = p,
                Err(_) => tracing::warn!("Ignoring invalid BOLUS_API_PORT: {}", port),
            }
        }

        if let Some(url) = lookup("BOLUS_TANDEM_URL") {
            self.tandem.base_url = url;
        }

        if let Some(level) = lookup("BOLUS_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("BOLUS_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Bolus History Configuration
#
# Environment variables override these settings:
# - BOLUS_DATABASE
# - BOLUS_API_HOST
# - BOLUS_API_PORT
# - BOLUS_TANDEM_URL
# - BOLUS_LOG_LEVEL
# - BOLUS_LOG_FORMAT
#
# t:connect credentials are only read from the environment:
# - TCONNECT_EMAIL
# - TCONNECT_PASSWORD
# - TCONNECT_SERIAL_NUMBER

[storage]
# SQLite database file
database_path = "~/.local/share/bolus-history/history.db"

[api]
# API server host
host = "127.0.0.1"

# API server port
port = 8090

# Allowed CORS origins (empty = same origin only)
cors_origins = []

# Largest accepted request body in bytes (feed imports)
max_body_size = 20971520

[tandem]
# t:connect service base URL
base_url = "https://tdcservices.tandemdiabetes.com"

# Login endpoint
login_url = "https://tdcservices.tandemdiabetes.com/accounts/api/login"

# Request timeout in seconds
request_timeout_secs = 60

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
