//! Worker configuration loading from file and environment variables.

use concierge_voice::LiveKitConfig;
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// Top-level worker configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// LiveKit server credentials.
    #[serde(default)]
    pub livekit: LiveKitConfig,

    /// Speech, language model and TTS vendor keys.
    #[serde(default)]
    pub providers: ProviderKeys,

    /// Where captured leads are posted.
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Backend serving the agent-facing calendar endpoints.
    #[serde(default)]
    pub calendar_api: CalendarApiConfig,

    /// The business the default script speaks for.
    #[serde(default)]
    pub business: BusinessConfig,

    /// Session timing.
    #[serde(default)]
    pub session: SessionConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Vendor API keys. Absent keys degrade the worker instead of stopping it.
#[derive(Clone, Default, Deserialize)]
pub struct ProviderKeys {
    #[serde(default)]
    pub deepgram_api_key: Option<String>,
    #[serde(default)]
    pub groq_api_key: Option<String>,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub cartesia_api_key: Option<String>,
}

impl fmt::Debug for ProviderKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |key: &Option<String>| key.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("ProviderKeys")
            .field("deepgram_api_key", &redact(&self.deepgram_api_key))
            .field("groq_api_key", &redact(&self.groq_api_key))
            .field("openai_api_key", &redact(&self.openai_api_key))
            .field("cartesia_api_key", &redact(&self.cartesia_api_key))
            .finish()
    }
}

impl ProviderKeys {
    /// Looks a key up by its environment variable name.
    pub fn get(&self, var: &str) -> Option<&str> {
        let key = match var {
            "DEEPGRAM_API_KEY" => &self.deepgram_api_key,
            "GROQ_API_KEY" => &self.groq_api_key,
            "OPENAI_API_KEY" => &self.openai_api_key,
            "CARTESIA_API_KEY" => &self.cartesia_api_key,
            _ => return None,
        };
        key.as_deref().filter(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    #[serde(default)]
    pub url: Option<String>,

    /// Upper bound on one delivery attempt.
    #[serde(default = "default_request_timeout_seconds")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalendarApiConfig {
    #[serde(default = "default_calendar_api_url")]
    pub base_url: String,

    #[serde(default = "default_request_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Offset appended to booked times.
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BusinessConfig {
    /// Attached to leads whose form did not say which business they belong to.
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default = "default_business_name")]
    pub name: String,

    #[serde(default = "default_knowledge_base")]
    pub knowledge_base: String,

    /// Instruction template for the default script.
    #[serde(default = "default_prompt_template")]
    pub prompt_template: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// How long a caller may stay away before the call ends. Zero ends it at once.
    #[serde(default)]
    pub away_grace_seconds: u64,

    /// How long to wait for the caller's audio before giving up.
    #[serde(default = "default_greeting_timeout_seconds")]
    pub greeting_timeout_seconds: u64,

    /// Pause before the outbound greeting while the phone leg settles.
    #[serde(default = "default_outbound_greeting_delay_ms")]
    pub outbound_greeting_delay_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "concierge_agent=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_request_timeout_seconds() -> u64 {
    10
}

fn default_calendar_api_url() -> String {
    "https://newport-rentals.onrender.com".to_string()
}

fn default_utc_offset() -> String {
    "-07:00".to_string()
}

fn default_business_name() -> String {
    "Voice Sell AI".to_string()
}

fn default_knowledge_base() -> String {
    "VoiceSell provides AI solutions for sales and customer service.".to_string()
}

fn default_prompt_template() -> String {
    "prompt.template".to_string()
}

fn default_greeting_timeout_seconds() -> u64 {
    20
}

fn default_outbound_greeting_delay_ms() -> u64 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_seconds: default_request_timeout_seconds(),
        }
    }
}

impl Default for CalendarApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_calendar_api_url(),
            timeout_seconds: default_request_timeout_seconds(),
            utc_offset: default_utc_offset(),
        }
    }
}

impl Default for BusinessConfig {
    fn default() -> Self {
        Self {
            id: None,
            name: default_business_name(),
            knowledge_base: default_knowledge_base(),
            prompt_template: default_prompt_template(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            away_grace_seconds: 0,
            greeting_timeout_seconds: default_greeting_timeout_seconds(),
            outbound_greeting_delay_ms: default_outbound_greeting_delay_ms(),
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

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A credential the worker cannot run without is not set.
    #[error("missing required credentials: {}", .0.join(", "))]
    MissingCredentials(Vec<&'static str>),
}

impl Config {
    /// Fails when any LiveKit credential is missing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let missing = self.livekit.missing_credentials();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingCredentials(missing))
        }
    }
}

/// Loads configuration from a TOML file, falling back to defaults, then
/// applies environment overrides.
///
/// Environment variable overrides:
/// - `LIVEKIT_URL`, `LIVEKIT_API_KEY`, `LIVEKIT_API_SECRET`
/// - `DEEPGRAM_API_KEY`, `GROQ_API_KEY`, `OPENAI_API_KEY`, `CARTESIA_API_KEY`
/// - `WEBHOOK_URL` overrides `webhook.url`
/// - `CALENDAR_API_URL` overrides `calendar_api.base_url`
/// - `BUSINESS_ID`, `BUSINESS_NAME`, `KNOWLEDGE_BASE` override `business.*`
/// - `CONCIERGE_AWAY_GRACE_SECONDS` overrides `session.away_grace_seconds`
/// - `CONCIERGE_LOG_LEVEL` overrides `logging.level`
/// - `CONCIERGE_LOG_JSON` overrides `logging.json` (set to "true" to enable)
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

    config.livekit.apply_env();

    let keys = &mut config.providers;
    for (var, slot) in [
        ("DEEPGRAM_API_KEY", &mut keys.deepgram_api_key),
        ("GROQ_API_KEY", &mut keys.groq_api_key),
        ("OPENAI_API_KEY", &mut keys.openai_api_key),
        ("CARTESIA_API_KEY", &mut keys.cartesia_api_key),
    ] {
        if let Ok(value) = std::env::var(var) {
            *slot = Some(value);
        }
    }

    if let Ok(url) = std::env::var("WEBHOOK_URL") {
        config.webhook.url = Some(url).filter(|u| !u.trim().is_empty());
    }
    if let Ok(url) = std::env::var("CALENDAR_API_URL") {
        config.calendar_api.base_url = url;
    }
    if let Ok(id) = std::env::var("BUSINESS_ID") {
        config.business.id = Some(id);
    }
    if let Ok(name) = std::env::var("BUSINESS_NAME") {
        config.business.name = name;
    }
    if let Ok(kb) = std::env::var("KNOWLEDGE_BASE") {
        config.business.knowledge_base = kb;
    }
    if let Ok(grace) = std::env::var("CONCIERGE_AWAY_GRACE_SECONDS") {
        if let Ok(parsed) = grace.parse() {
            config.session.away_grace_seconds = parsed;
        }
    }
    if let Ok(level) = std::env::var("CONCIERGE_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("CONCIERGE_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.webhook.timeout_seconds, 10);
        assert_eq!(config.calendar_api.utc_offset, "-07:00");
        assert_eq!(config.business.name, "Voice Sell AI");
        assert_eq!(config.session.away_grace_seconds, 0);
        assert_eq!(config.session.greeting_timeout_seconds, 20);
        assert_eq!(config.session.outbound_greeting_delay_ms, 3000);
    }

    #[test]
    fn sections_parse_from_toml() {
        let config: Config = toml::from_str(
            r#"
            [livekit]
            url = "wss://demo.livekit.cloud"
            api_key = "key"
            api_secret = "secret"

            [webhook]
            url = "https://hooks.example.com/lead"

            [session]
            away_grace_seconds = 15
            "#,
        )
        .unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.webhook.url.as_deref(),
            Some("https://hooks.example.com/lead")
        );
        assert_eq!(config.session.away_grace_seconds, 15);
    }

    #[test]
    fn validation_names_every_missing_credential() {
        let err = Config::default().validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing required credentials: LIVEKIT_URL, LIVEKIT_API_KEY, LIVEKIT_API_SECRET"
        );
    }

    #[test]
    fn provider_keys_are_redacted_and_blank_keys_ignored() {
        let keys = ProviderKeys {
            groq_api_key: Some("gsk_live".into()),
            cartesia_api_key: Some("  ".into()),
            ..ProviderKeys::default()
        };
        assert_eq!(keys.get("GROQ_API_KEY"), Some("gsk_live"));
        assert_eq!(keys.get("CARTESIA_API_KEY"), None);
        assert!(!format!("{keys:?}").contains("gsk_live"));
    }
}
