//! Calendar booking payloads shared by the agent and the backend.

use serde::{Deserialize, Serialize};

/// A request to put a viewing on the calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub guest_name: String,
    pub guest_phone: String,
    #[serde(default)]
    pub guest_email: String,
    /// RFC 3339 start time, including the UTC offset.
    pub start_time: String,
    /// RFC 3339 end time, including the UTC offset.
    pub end_time: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: String,
}

impl BookingRequest {
    /// Event title shown on the calendar.
    pub fn summary(&self) -> String {
        self.title
            .clone()
            .unwrap_or_else(|| format!("Newport Beach Rental - {}", self.guest_name))
    }
}

/// Ask for open slots on a given day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityRequest {
    /// Day in `YYYY-MM-DD` form.
    pub date: String,
    /// Appointment length in minutes.
    #[serde(default = "default_duration")]
    pub duration: u32,
}

fn default_duration() -> u32 {
    60
}

/// Agent-facing availability answer: already phrased for speech.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentAvailabilityResponse {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub available_times: Vec<String>,
}

/// Agent-facing booking answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentBookingResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub event_id: Option<String>,
}

/// Agent-facing list of bookable days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDatesResponse {
    pub success: bool,
    #[serde(default)]
    pub available_dates: Vec<AvailableDate>,
}

/// A bookable day, as offered to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableDate {
    /// `YYYY-MM-DD`.
    pub date: String,
    /// e.g. `Monday, August 26`.
    pub display: String,
}
