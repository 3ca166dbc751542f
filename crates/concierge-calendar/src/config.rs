use crate::error::CalendarError;
use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use std::fmt;

fn default_calendar_id() -> String {
    "primary".to_string()
}

fn default_credentials_file() -> String {
    "google-credentials.json".to_string()
}

fn default_time_zone() -> String {
    "America/Los_Angeles".to_string()
}

fn default_utc_offset() -> String {
    "-07:00".to_string()
}

fn default_location() -> String {
    "Newport Beach, CA".to_string()
}

fn default_api_base() -> String {
    "https://www.googleapis.com/calendar/v3".to_string()
}

#[derive(Clone, Deserialize)]
pub struct CalendarConfig {
    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,

    /// Service account key file. Checked before `service_account_json`.
    #[serde(default = "default_credentials_file")]
    pub credentials_file: String,

    /// Inline service account key, usually injected through the environment.
    #[serde(default)]
    pub service_account_json: Option<String>,

    /// IANA zone sent to Google with queries and events.
    #[serde(default = "default_time_zone")]
    pub time_zone: String,

    /// Offset used to place slot windows and render local times.
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,

    /// Location written on created events.
    #[serde(default = "default_location")]
    pub location: String,

    #[serde(default = "default_api_base")]
    pub api_base: String,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            calendar_id: default_calendar_id(),
            credentials_file: default_credentials_file(),
            service_account_json: None,
            time_zone: default_time_zone(),
            utc_offset: default_utc_offset(),
            location: default_location(),
            api_base: default_api_base(),
        }
    }
}

impl fmt::Debug for CalendarConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalendarConfig")
            .field("calendar_id", &self.calendar_id)
            .field("credentials_file", &self.credentials_file)
            .field(
                "service_account_json",
                &self.service_account_json.as_ref().map(|_| "[REDACTED]"),
            )
            .field("time_zone", &self.time_zone)
            .field("utc_offset", &self.utc_offset)
            .field("location", &self.location)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl CalendarConfig {
    /// Overlays `GOOGLE_CALENDAR_ID`, `GOOGLE_CREDENTIALS_FILE` and
    /// `GOOGLE_SERVICE_ACCOUNT_JSON`.
    pub fn apply_env(&mut self) {
        if let Ok(id) = std::env::var("GOOGLE_CALENDAR_ID") {
            self.calendar_id = id;
        }
        if let Ok(path) = std::env::var("GOOGLE_CREDENTIALS_FILE") {
            self.credentials_file = path;
        }
        if let Ok(json) = std::env::var("GOOGLE_SERVICE_ACCOUNT_JSON") {
            if !json.trim().is_empty() {
                self.service_account_json = Some(json);
            }
        }
    }

    /// Parses `utc_offset` (`-07:00`, `+05:30`, `Z`).
    pub fn offset(&self) -> Result<FixedOffset, CalendarError> {
        DateTime::parse_from_rfc3339(&format!("2000-01-01T00:00:00{}", self.utc_offset))
            .map(|dt| *dt.offset())
            .map_err(|_| CalendarError::Config(format!("bad utc_offset {:?}", self.utc_offset)))
    }
}
