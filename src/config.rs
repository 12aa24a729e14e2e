//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub broker: BrokerConfig,

    #[serde(default)]
    pub ui: UiConfig,

    #[serde(default)]
    pub stream: StreamConfig,

    #[serde(default)]
    pub tiles: TilesConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// MQTT broker connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    #[serde(default = "default_mqtt_host")]
    pub host: String,

    #[serde(default = "default_mqtt_port")]
    pub port: u16,

    /// MQTT client identifier; generated when absent
    #[serde(default)]
    pub client_id: Option<String>,

    /// Topic filters subscribed after every (re)connect
    #[serde(default = "default_subscriptions")]
    pub subscriptions: Vec<String>,

    #[serde(default)]
    pub qos: u8,

    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval_ms: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_mqtt_keep_alive")]
    pub keep_alive_secs: u64,

    /// Capacity of the client request queue and of the inbound message channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_mqtt_host() -> String {
    "127.0.0.1".to_string()
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_subscriptions() -> Vec<String> {
    vec!["#".to_string()]
}

fn default_reconnect_interval() -> u64 {
    15_000
}

fn default_connect_timeout() -> u64 {
    5_000
}

fn default_mqtt_keep_alive() -> u64 {
    30
}

fn default_channel_capacity() -> usize {
    256
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            client_id: None,
            subscriptions: default_subscriptions(),
            qos: 0,
            reconnect_interval_ms: default_reconnect_interval(),
            connect_timeout_ms: default_connect_timeout(),
            keep_alive_secs: default_mqtt_keep_alive(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl BrokerConfig {
    /// Create config for a broker at the given address
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Client id to present to the broker
    pub fn client_id(&self) -> String {
        match &self.client_id {
            Some(id) => id.clone(),
            None => {
                let suffix = uuid::Uuid::new_v4().simple().to_string();
                format!("marquette-{}", &suffix[..8])
            }
        }
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Web UI / HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_ui_host")]
    pub host: String,

    #[serde(default = "default_ui_port")]
    pub port: u16,

    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_ui_host() -> String {
    "0.0.0.0".to_string()
}

fn default_ui_port() -> u16 {
    1890
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            host: default_ui_host(),
            port: default_ui_port(),
            cors_origins: Vec::new(),
        }
    }
}

impl UiConfig {
    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Event stream (browser fan-out) configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval_ms: u64,

    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Frames queued per browser before it is considered stalled
    #[serde(default = "default_connection_buffer")]
    pub connection_buffer: usize,
}

fn default_keepalive_interval() -> u64 {
    20_000
}

fn default_max_connections() -> usize {
    1000
}

fn default_connection_buffer() -> usize {
    64
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            keepalive_interval_ms: default_keepalive_interval(),
            max_connections: default_max_connections(),
            connection_buffer: default_connection_buffer(),
        }
    }
}

/// Tile layout document configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TilesConfig {
    #[serde(default = "default_tiles_path")]
    pub path: PathBuf,
}

fn default_tiles_path() -> PathBuf {
    PathBuf::from("tiles.json")
}

impl Default for TilesConfig {
    fn default() -> Self {
        Self {
            path: default_tiles_path(),
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

    /// Force debug-level output for this crate
    #[serde(default)]
    pub verbose: bool,
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
            verbose: false,
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

        let config = Self::parse(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
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

    /// First existing config file in the default locations
    pub fn locate() -> Option<PathBuf> {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("marquette").join("config.toml")),
            Some(PathBuf::from("/etc/marquette/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        first_existing(config_paths.into_iter().flatten())
    }

    /// Reject intervals that would panic a timer or spin a retry loop
    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_zero = [
            ("stream.keepalive_interval_ms", self.stream.keepalive_interval_ms),
            ("broker.reconnect_interval_ms", self.broker.reconnect_interval_ms),
            ("broker.connect_timeout_ms", self.broker.connect_timeout_ms),
        ];

        for (field, value) in non_zero {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("MARQUETTE_MQTT_HOST") {
            self.broker.host = host;
        }
        if let Ok(port) = std::env::var("MARQUETTE_MQTT_PORT") {
            if let Ok(p) = port.parse() {
                self.broker.port = p;
            }
        }

        if let Ok(host) = std::env::var("MARQUETTE_UI_HOST") {
            self.ui.host = host;
        }
        if let Ok(port) = std::env::var("MARQUETTE_UI_PORT") {
            if let Ok(p) = port.parse() {
                self.ui.port = p;
            }
        }

        if let Ok(path) = std::env::var("MARQUETTE_TILES_PATH") {
            self.tiles.path = PathBuf::from(path);
        }

        if let Ok(level) = std::env::var("MARQUETTE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("MARQUETTE_LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Ok(verbose) = std::env::var("MARQUETTE_VERBOSE") {
            self.logging.verbose = verbose.to_lowercase() != "false" && verbose != "0";
        }
    }
}

fn first_existing(candidates: impl IntoIterator<Item = PathBuf>) -> Option<PathBuf> {
    candidates.into_iter().find(|path| path.exists())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r##"# Marquette Configuration
#
# Environment variables override these settings:
# - MARQUETTE_MQTT_HOST
# - MARQUETTE_MQTT_PORT
# - MARQUETTE_UI_HOST
# - MARQUETTE_UI_PORT
# - MARQUETTE_TILES_PATH
# - MARQUETTE_LOG_LEVEL
# - MARQUETTE_LOG_FORMAT
# - MARQUETTE_VERBOSE

[broker]
# Hostname of the MQTT broker to send and receive messages to
host = "127.0.0.1"

# TCP port the MQTT broker is listening on
port = 1883

# Client identifier (a random one is generated when unset)
# client_id = "marquette"

# Topic filters to relay to browsers
subscriptions = ["#"]

# QoS used for subscriptions and publishes (0, 1 or 2)
qos = 0

# Retry time for MQTT connections (ms)
reconnect_interval_ms = 15000

# Give up on the initial connection attempt after (ms)
connect_timeout_ms = 5000

# MQTT keep-alive (seconds)
keep_alive_secs = 30

[ui]
# Interface the web server listens on; use 127.0.0.1 for local-only access
host = "0.0.0.0"

# TCP port the web server is listening on
port = 1890

# Allowed CORS origins (empty = same-origin only)
cors_origins = []

[stream]
# Comment frame sent to every browser to keep idle connections open (ms)
keepalive_interval_ms = 20000

# Maximum number of concurrent browser streams
max_connections = 1000

# Frames buffered per browser before it is dropped as stalled
connection_buffer = 64

[tiles]
# Tile layout document
path = "tiles.json"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Enable verbose logging output
verbose = false
"##
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.broker.host, "127.0.0.1");
        assert_eq!(config.broker.port, 1883);
        assert_eq!(config.broker.reconnect_interval_ms, 15_000);
        assert_eq!(config.ui.addr(), "0.0.0.0:1890");
        assert_eq!(config.stream.keepalive_interval_ms, 20_000);
        assert_eq!(config.tiles.path, PathBuf::from("tiles.json"));
        assert!(!config.logging.verbose);
    }

    #[test]
    fn test_default_template_parses() {
        let config = Config::parse(&generate_default_config()).unwrap();
        assert_eq!(config.broker.subscriptions, vec!["#"]);
        assert_eq!(config.ui.port, 1890);
        assert_eq!(config.stream.connection_buffer, 64);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::parse(
            r#"
            [broker]
            host = "broker.local"
            subscriptions = ["home/#", "garden/+/temp"]
            "#,
        )
        .unwrap();

        assert_eq!(config.broker.host, "broker.local");
        assert_eq!(config.broker.port, 1883);
        assert_eq!(config.broker.subscriptions.len(), 2);
        assert_eq!(config.ui.port, 1890);
    }

    #[test]
    fn test_client_id() {
        let mut broker = BrokerConfig::default();
        assert!(broker.client_id().starts_with("marquette-"));

        broker.client_id = Some("dash".to_string());
        assert_eq!(broker.client_id(), "dash");
    }

    #[test]
    fn test_zero_intervals_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        std::fs::write(&path, "[stream]\nkeepalive_interval_ms = 0\n").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "stream.keepalive_interval_ms",
                ..
            }
        ));

        std::fs::write(&path, "[broker]\nreconnect_interval_ms = 0\n").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "broker.reconnect_interval_ms",
                ..
            }
        ));

        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_first_existing_config_wins() {
        let dir = tempfile::tempdir().unwrap();
        let user = dir.path().join("user.toml");
        let system = dir.path().join("system.toml");
        let local = dir.path().join("local.toml");
        std::fs::write(&system, "").unwrap();
        std::fs::write(&local, "").unwrap();

        let found = first_existing([user.clone(), system.clone(), local]);
        assert_eq!(found, Some(system));
        assert_eq!(first_existing([user]), None);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/nonexistent/marquette.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_load_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[broker\nport = ").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
