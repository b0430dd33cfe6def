//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use chrono_tz::Tz;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Canonical timezone every reading is normalized into
    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default)]
    pub telegram: TelegramConfig,

    pub hub: Option<HubConfig>,

    pub heating: Option<HeatingConfig>,

    pub gateway: Option<GatewayConfig>,

    /// Group key -> header label
    #[serde(default)]
    pub groups: BTreeMap<String, String>,

    /// Ordered display layout
    #[serde(default)]
    pub sensors: Vec<SensorEntry>,

    #[serde(default)]
    pub state: StateConfig,

    #[serde(default)]
    pub changelog: ChangeLogConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_timezone() -> String {
    "Europe/Berlin".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

/// Telegram bot configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub token: String,

    /// Chat holding the edited message
    #[serde(default)]
    pub chat_id: i64,

    /// Message that is edited in place on every cycle
    #[serde(default)]
    pub message_id: i64,

    #[serde(default = "default_telegram_api_url")]
    pub api_url: String,

    /// Long-poll window for getUpdates
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_poll_timeout() -> u64 {
    30
}

/// FHEM hub configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HubConfig {
    /// Base URL of FHEMWEB, e.g. "https://fhem.local:8083"
    pub url: String,

    pub username: Option<String>,

    pub password: Option<String>,

    /// Device names to query
    #[serde(default = "default_name_pattern")]
    pub name_pattern: String,

    /// Zone the hub writes reading times in (defaults to the canonical one)
    pub timezone: Option<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Device name -> sensor id
    #[serde(default)]
    pub names: BTreeMap<String, String>,
}

fn default_name_pattern() -> String {
    "Temp.*".to_string()
}

/// Heating system live-data API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HeatingConfig {
    pub host: String,

    #[serde(default = "default_heating_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Live-data name -> sensor id
    #[serde(default)]
    pub names: BTreeMap<String, String>,
}

fn default_heating_port() -> u16 {
    8080
}

/// Zigbee gateway (deCONZ) configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Host and optional port, e.g. "raspbee.local:80"
    pub host: String,

    pub api_key: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Sensor id -> metric name -> gateway sensor number
    #[serde(default)]
    pub sensors: BTreeMap<String, BTreeMap<String, u32>>,
}

/// One entry of the display layout
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SensorEntry {
    pub id: String,
    pub name: String,
    pub group: String,
}

/// Persisted state configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StateConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_data_dir() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("climate-channel").to_string_lossy().to_string())
        .unwrap_or_else(|| "./climate_data".to_string())
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl StateConfig {
    /// State directory with a leading `~` expanded to the home directory
    pub fn dir(&self) -> PathBuf {
        expand_home(&self.data_dir)
    }

    /// Last-snapshot file
    pub fn snapshot_path(&self) -> PathBuf {
        self.dir().join("data.json")
    }

    /// View-state file
    pub fn view_path(&self) -> PathBuf {
        self.dir().join("view.json")
    }
}

fn expand_home(path: &str) -> PathBuf {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => return PathBuf::from(path),
    };
    match dirs::home_dir() {
        Some(home) if rest.is_empty() => home,
        Some(home) => home.join(rest),
        None => PathBuf::from(path),
    }
}

/// Change log database configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangeLogConfig {
    /// SQLite database path (default: `<data_dir>/changes.db`)
    pub database: Option<String>,
}

/// In-process push schedule
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScheduleConfig {
    /// Push interval while listening; unset means pushes come from outside
    pub push_interval_secs: Option<u64>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,

    pub file: Option<String>,
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
            file: None,
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

        Self::parse(&content).map_err(|error| match error {
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

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from an explicit path or the default locations
    pub fn load_default(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            let config = Self::load_with_env(path)?;
            tracing::info!("Loaded config from {:?}", path);
            return Ok(config);
        }

        let config_paths = [
            dirs::config_dir().map(|p| p.join("climate-channel").join("config.toml")),
            Some(PathBuf::from("/etc/climate-channel/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                let config = Self::load_with_env(path)?;
                tracing::info!("Loaded config from {:?}", path);
                return Ok(config);
            }
        }

        Err(ConfigError::NotFound)
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("CLIMATE_TELEGRAM_TOKEN") {
            self.telegram.token = token;
        }
        if let Ok(data_dir) = std::env::var("CLIMATE_DATA_DIR") {
            self.state.data_dir = data_dir;
        }
        if let Ok(level) = std::env::var("CLIMATE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("CLIMATE_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Check everything a cycle relies on before any cycle runs
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.telegram.token.trim().is_empty() {
            return Err(ConfigError::Missing("telegram.token"));
        }
        if self.telegram.chat_id == 0 {
            return Err(ConfigError::Missing("telegram.chat_id"));
        }
        if self.telegram.message_id == 0 {
            return Err(ConfigError::Missing("telegram.message_id"));
        }

        if self.schedule.push_interval_secs == Some(0) {
            return Err(ConfigError::Invalid {
                field: "schedule.push_interval_secs",
                error: "must be greater than zero".into(),
            });
        }

        self.canonical_timezone()?;
        if let Some(hub) = &self.hub {
            if let Some(tz) = &hub.timezone {
                parse_timezone(tz)?;
            }
            regex::Regex::new(&hub.name_pattern).map_err(|e| ConfigError::Invalid {
                field: "hub.name_pattern",
                error: e.to_string(),
            })?;
        }
        if let Some(gateway) = &self.gateway {
            for (sensor, metrics) in &gateway.sensors {
                for metric in metrics.keys() {
                    if crate::model::MetricKind::parse(metric).is_none() {
                        return Err(ConfigError::Invalid {
                            field: "gateway.sensors",
                            error: format!("unknown metric {:?} for sensor {}", metric, sensor),
                        });
                    }
                }
            }
        }

        for sensor in &self.sensors {
            if !self.groups.contains_key(&sensor.group) {
                return Err(ConfigError::UnknownGroup {
                    sensor: sensor.id.clone(),
                    group: sensor.group.clone(),
                });
            }
        }

        Ok(())
    }

    /// The canonical timezone
    pub fn canonical_timezone(&self) -> Result<Tz, ConfigError> {
        parse_timezone(&self.timezone)
    }

    /// SQLite path for the change log
    pub fn changelog_path(&self) -> PathBuf {
        match &self.changelog.database {
            Some(path) => expand_home(path),
            None => self.state.dir().join("changes.db"),
        }
    }
}

/// Resolve an IANA timezone name
pub fn parse_timezone(name: &str) -> Result<Tz, ConfigError> {
    name.parse::<Tz>()
        .map_err(|_| ConfigError::UnknownTimezone(name.to_string()))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("No config file found in the default locations")]
    NotFound,

    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid setting {field}: {error}")]
    Invalid { field: &'static str, error: String },

    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    #[error("Sensor {sensor} refers to unknown group {group}")]
    UnknownGroup { sensor: String, group: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Climate Channel Configuration
#
# Environment variables override these settings:
# - CLIMATE_TELEGRAM_TOKEN
# - CLIMATE_DATA_DIR
# - CLIMATE_LOG_LEVEL
# - CLIMATE_LOG_FORMAT

# Timezone all reading timestamps are converted into
timezone = "Europe/Berlin"

[telegram]
# Bot token from @BotFather
token = ""

# Chat and message that get edited in place
chat_id = 0
message_id = 0

# Long-poll window for button presses (seconds)
poll_timeout_secs = 30

[hub]
# FHEMWEB base URL
url = "https://fhem.local:8083"
username = ""
password = ""

# Devices to read humidity/temperature from
name_pattern = "Temp.*"

[hub.names]
# FHEM device name = sensor id
"Temp.Kitchen" = "1"

[heating]
host = "192.168.0.20"
port = 8080

[heating.names]
# Live-data name = sensor id
"Outdoor temperature" = "10"

[gateway]
host = "raspbee.local"
api_key = ""

[gateway.sensors.20]
# metric = gateway sensor number
temperature = 5
humidity = 6
pressure = 7

[groups]
# group key = header label (groups are ordered by key)
a = "Inside"
b = "Outside"

[[sensors]]
id = "1"
name = "Kitchen"
group = "a"

[[sensors]]
id = "10"
name = "Garden"
group = "b"

[state]
# Directory holding data.json and view.json (default: the user data directory)
# data_dir = "/var/lib/climate-channel"

[changelog]
# SQLite database for value changes (default: <data_dir>/changes.db)
# database = "/var/lib/climate-channel/changes.db"

[schedule]
# Push on a timer while listening (seconds); leave unset when cron runs `push`
# push_interval_secs = 300

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Optional log file path
# file = "/var/log/climate-channel/climate-channel.log"
"#
    .to_string()
}
