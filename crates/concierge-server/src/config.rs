//! Server configuration loading from file and environment variables.

use concierge_calendar::CalendarConfig;
use concierge_voice::LiveKitConfig;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Browser origins allowed to call the API.
    #[serde(default)]
    pub cors: CorsConfig,

    /// LiveKit credentials for tokens, rooms and SIP.
    #[serde(default)]
    pub livekit: LiveKitConfig,

    /// Google Calendar used for viewings.
    #[serde(default)]
    pub calendar: CalendarConfig,

    /// Outbound dialer defaults.
    #[serde(default)]
    pub dialer: DialerConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "concierge_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DialerConfig {
    /// Business that outbound calls and agent leads are filed under when
    /// the request names none.
    #[serde(default = "default_business_id")]
    pub business_id: String,

    /// Caller name shown to the callee.
    #[serde(default = "default_caller_name")]
    pub caller_name: String,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    8002
}

fn default_db_path() -> String {
    "concierge.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:3001".to_string(),
        "https://www.voicesellai.com".to_string(),
    ]
}

fn default_business_id() -> String {
    "newport-rentals".to_string()
}

pub(crate) fn default_caller_name() -> String {
    "Newport Rentals".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
        }
    }
}

impl Default for DialerConfig {
    fn default() -> Self {
        Self {
            business_id: default_business_id(),
            caller_name: default_caller_name(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `CONCIERGE_HOST` overrides `server.host`
/// - `CONCIERGE_PORT` overrides `server.port`
/// - `CONCIERGE_DB_PATH` overrides `database.path`
/// - `CONCIERGE_LOG_LEVEL` overrides `logging.level`
/// - `CONCIERGE_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `CONCIERGE_CORS_ORIGINS` overrides `cors.allowed_origins` (comma separated)
/// - `LIVEKIT_URL`, `LIVEKIT_API_KEY`, `LIVEKIT_API_SECRET`, `SIP_TRUNK_ID`
/// - `GOOGLE_CALENDAR_ID`, `GOOGLE_CREDENTIALS_FILE`, `GOOGLE_SERVICE_ACCOUNT_JSON`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    // Environment variable overrides
    if let Ok(host) = std::env::var("CONCIERGE_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Ok(port) = std::env::var("CONCIERGE_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Ok(db_path) = std::env::var("CONCIERGE_DB_PATH") {
        config.database.path = db_path;
    }
    if let Ok(level) = std::env::var("CONCIERGE_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("CONCIERGE_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Ok(origins) = std::env::var("CONCIERGE_CORS_ORIGINS") {
        config.cors.allowed_origins = parse_origins(&origins);
    }
    config.livekit.apply_env();
    config.calendar.apply_env();

    Ok(config)
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}
