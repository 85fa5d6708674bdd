//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::amqp::SourceOptions;
use crate::connection::{TranslatorConfig, AMQPS_PORT};
use crate::consumer::{EventPosition, ReaderConfig};
use crate::dashboard::DEFAULT_WINDOW_CAPACITY;
use crate::websocket::HubConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub iothub: IotHubConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub dashboard: DashboardConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// IoT Hub source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IotHubConfig {
    /// `HostName=...;SharedAccessKeyName=...;SharedAccessKey=...`
    #[serde(default)]
    pub connection_string: String,

    #[serde(default = "default_consumer_group")]
    pub consumer_group: String,

    #[serde(default = "default_token_ttl")]
    pub token_ttl_minutes: u64,

    #[serde(default = "default_redirect_timeout")]
    pub redirect_timeout_secs: u64,

    /// Bound on each partition discovery step against `$management`
    #[serde(default = "default_management_timeout")]
    pub management_timeout_secs: u64,

    /// Used for both discovery and the Event Hub connection
    #[serde(default = "default_amqp_port")]
    pub amqp_port: u16,

    /// `latest`, `earliest` or an RFC 3339 instant
    #[serde(default = "default_start_position")]
    pub start_position: String,

    /// Empty means every partition the hub reports
    #[serde(default)]
    pub partition_ids: Vec<String>,
}

fn default_consumer_group() -> String {
    "$Default".to_string()
}

fn default_token_ttl() -> u64 {
    5
}

fn default_redirect_timeout() -> u64 {
    30
}

fn default_management_timeout() -> u64 {
    30
}

fn default_amqp_port() -> u16 {
    AMQPS_PORT
}

fn default_start_position() -> String {
    "latest".to_string()
}

impl Default for IotHubConfig {
    fn default() -> Self {
        Self {
            connection_string: String::new(),
            consumer_group: default_consumer_group(),
            token_ttl_minutes: default_token_ttl(),
            redirect_timeout_secs: default_redirect_timeout(),
            management_timeout_secs: default_management_timeout(),
            amqp_port: default_amqp_port(),
            start_position: default_start_position(),
            partition_ids: Vec::new(),
        }
    }
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ApiConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Dashboard relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Readings kept per device
    #[serde(default = "default_window_capacity")]
    pub window_capacity: usize,

    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
}

fn default_window_capacity() -> usize {
    DEFAULT_WINDOW_CAPACITY
}

fn default_max_connections() -> usize {
    1000
}

fn default_broadcast_capacity() -> usize {
    1024
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            window_capacity: default_window_capacity(),
            max_connections: default_max_connections(),
            broadcast_capacity: default_broadcast_capacity(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `pretty` or `json`
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

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
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

    /// Default config file locations, in search order
    pub fn default_paths() -> Vec<PathBuf> {
        [
            dirs::config_dir().map(|p| p.join("telemetry-bridge").join("config.toml")),
            Some(PathBuf::from("/etc/telemetry-bridge/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        for path in Self::default_paths() {
            if path.exists() {
                match Self::load_with_env(&path) {
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

    /// Load an explicit file if given, otherwise search the default locations
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load_with_env(path),
            None => Ok(Self::load_default()),
        }
    }

    /// Apply environment variable overrides to an existing config
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`; the first name listed for a setting wins
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |keys: &[&str]| keys.iter().find_map(|k| lookup(k));

        if let Some(cs) = first(&["IOTHUB_CONNECTION_STRING", "IotHubConnectionString"]) {
            self.iothub.connection_string = cs;
        }
        if let Some(group) = first(&["EVENTHUB_CONSUMER_GROUP", "EventHubConsumerGroup"]) {
            self.iothub.consumer_group = group;
        }

        if let Some(host) = first(&["BRIDGE_API_HOST"]) {
            self.api.host = host;
        }
        if let Some(port) = first(&["BRIDGE_API_PORT", "PORT"]) {
            match port.parse() {
                Ok(p) => self.api.port = p,
                Err(_) => tracing::warn!(port = %port, "Ignoring invalid port override"),
            }
        }

        if let Some(level) = first(&["BRIDGE_LOG_LEVEL"]) {
            self.logging.level = level;
        }
        if let Some(format) = first(&["BRIDGE_LOG_FORMAT"]) {
            self.logging.format = format;
        }
    }

    pub fn translator_config(&self) -> TranslatorConfig {
        TranslatorConfig {
            token_ttl_minutes: self.iothub.token_ttl_minutes,
            redirect_timeout: Duration::from_secs(self.iothub.redirect_timeout_secs),
            port: self.iothub.amqp_port,
        }
    }

    pub fn source_options(&self) -> SourceOptions {
        SourceOptions {
            port: self.iothub.amqp_port,
            management_timeout: Duration::from_secs(self.iothub.management_timeout_secs),
        }
    }

    pub fn reader_config(&self) -> Result<ReaderConfig, ConfigError> {
        let start_position: EventPosition =
            self.iothub
                .start_position
                .parse()
                .map_err(|e: String| ConfigError::Invalid {
                    field: "iothub.start_position",
                    error: e,
                })?;

        Ok(ReaderConfig {
            consumer_group: self.iothub.consumer_group.clone(),
            start_position,
            partition_ids: self.iothub.partition_ids.clone(),
        })
    }

    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            max_connections: self.dashboard.max_connections,
            broadcast_capacity: self.dashboard.broadcast_capacity,
        }
    }

    /// Copy safe to print: the shared access key is masked
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.iothub.connection_string = redact_key(&copy.iothub.connection_string);
        copy
    }
}

fn redact_key(connection_string: &str) -> String {
    connection_string
        .split(';')
        .map(|part| match part.split_once('=') {
            Some((key, _)) if key.trim().eq_ignore_ascii_case("SharedAccessKey") => {
                format!("{}=***", key)
            }
            _ => part.to_string(),
        })
        .collect::<Vec<_>>()
        .join(";")
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid value for {field}: {error}")]
    Invalid { field: &'static str, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Telemetry Bridge Configuration
#
# Environment variables override these settings:
# - IOTHUB_CONNECTION_STRING (or IotHubConnectionString)
# - EVENTHUB_CONSUMER_GROUP (or EventHubConsumerGroup)
# - BRIDGE_API_HOST
# - BRIDGE_API_PORT (or PORT)
# - BRIDGE_LOG_LEVEL
# - BRIDGE_LOG_FORMAT

[iothub]
# IoT Hub connection string with service or iothubowner rights
connection_string = ""

# Event Hub consumer group to read with
consumer_group = "$Default"

# Lifetime of the SAS token used for endpoint discovery (minutes)
token_ttl_minutes = 5

# How long to wait for the hub to redirect (seconds)
redirect_timeout_secs = 30

# How long each partition discovery step may take (seconds)
management_timeout_secs = 30

# AMQPS port, for discovery and for the Event Hub connection
amqp_port = 5671

# Where to start reading: latest, earliest, or an RFC 3339 timestamp
start_position = "latest"

# Partitions to read (empty = all)
partition_ids = []

[api]
# HTTP/WebSocket server host
host = "0.0.0.0"

# HTTP/WebSocket server port
port = 3000

[dashboard]
# Readings kept per device
window_capacity = 50

# Maximum concurrent WebSocket connections
max_connections = 1000

# Capacity of the internal broadcast channel
broadcast_capacity = 1024

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.iothub.consumer_group, "$Default");
        assert_eq!(config.iothub.token_ttl_minutes, 5);
        assert_eq!(config.iothub.amqp_port, 5671);
        assert_eq!(config.api.port, 3000);
        assert_eq!(config.api.addr(), "0.0.0.0:3000");
        assert_eq!(config.dashboard.window_capacity, 50);
        assert!(!config.logging.is_json());
    }

    #[test]
    fn test_generated_config_parses_to_defaults() {
        let config: Config = toml::from_str(&generate_default_config()).unwrap();
        let defaults = Config::default();
        assert_eq!(config.iothub.consumer_group, defaults.iothub.consumer_group);
        assert_eq!(config.iothub.redirect_timeout_secs, defaults.iothub.redirect_timeout_secs);
        assert_eq!(
            config.iothub.management_timeout_secs,
            defaults.iothub.management_timeout_secs
        );
        assert_eq!(config.api.port, defaults.api.port);
        assert_eq!(config.dashboard.max_connections, defaults.dashboard.max_connections);
        assert_eq!(config.logging.level, defaults.logging.level);
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[iothub]
connection_string = "HostName=h.azure-devices.net;SharedAccessKeyName=service;SharedAccessKey=a2V5"
start_position = "earliest"

[api]
port = 8080
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert!(config.iothub.connection_string.starts_with("HostName=h"));
        assert_eq!(config.iothub.consumer_group, "$Default");
        assert_eq!(config.api.port, 8080);
        assert_eq!(config.api.host, "0.0.0.0");

        let reader = config.reader_config().unwrap();
        assert_eq!(reader.start_position, EventPosition::Earliest);
    }

    #[test]
    fn test_load_errors() {
        let missing = Config::load(Path::new("/nonexistent/telemetry-bridge.toml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[api\nport = ").unwrap();
        assert!(matches!(Config::load(file.path()), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("IotHubConnectionString", "HostName=legacy"),
            ("EVENTHUB_CONSUMER_GROUP", "dashboard"),
            ("EventHubConsumerGroup", "ignored"),
            ("PORT", "4000"),
            ("BRIDGE_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.iothub.connection_string, "HostName=legacy");
        assert_eq!(config.iothub.consumer_group, "dashboard");
        assert_eq!(config.api.port, 4000);
        assert!(config.logging.is_json());
    }

    #[test]
    fn test_invalid_port_override_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|k| (k == "BRIDGE_API_PORT").then(|| "not-a-port".to_string()));
        assert_eq!(config.api.port, 3000);
    }

    #[test]
    fn test_derived_configs() {
        let mut config = Config::default();
        config.iothub.redirect_timeout_secs = 7;
        config.iothub.partition_ids = vec!["1".to_string()];
        config.dashboard.max_connections = 5;

        assert_eq!(config.translator_config().redirect_timeout, Duration::from_secs(7));
        assert_eq!(config.reader_config().unwrap().partition_ids, vec!["1"]);
        assert_eq!(config.hub_config().max_connections, 5);

        config.iothub.amqp_port = 5672;
        config.iothub.management_timeout_secs = 3;
        let options = config.source_options();
        assert_eq!(options.port, 5672);
        assert_eq!(options.management_timeout, Duration::from_secs(3));
        assert_eq!(config.translator_config().port, 5672);

        config.iothub.start_position = "yesterday".to_string();
        assert!(matches!(config.reader_config(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_redacted() {
        let mut config = Config::default();
        config.iothub.connection_string =
            "HostName=h;SharedAccessKeyName=service;SharedAccessKey=secret".to_string();
        let shown = config.redacted();
        assert_eq!(
            shown.iothub.connection_string,
            "HostName=h;SharedAccessKeyName=service;SharedAccessKey=***"
        );
    }
}
