//! Viewing bookings made during a call.
//!
//! Each operation calls the backend's agent-facing calendar endpoints and
//! returns the line the agent should speak. Failures never escape: every
//! error maps to a fixed apology.

use crate::config::CalendarApiConfig;
use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime, NaiveTime};
use concierge_types::{
    AgentAvailabilityResponse, AgentBookingResponse, AgentDatesResponse, AvailabilityRequest,
    BookingRequest,
};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{error, info};

const MAX_SPOKEN_TIMES: usize = 4;
const MAX_SPOKEN_DATES: usize = 5;

pub const AVAILABILITY_UNKNOWN: &str = "I'm having trouble checking availability right now.";
pub const AVAILABILITY_STATUS_ERROR: &str =
    "I'm experiencing technical difficulties checking the calendar. Please try again in a moment.";
pub const AVAILABILITY_ERROR: &str = "I'm having trouble accessing the calendar system right now. \
Would you like to try a different date?";

pub const BOOKING_REFUSED: &str =
    "I wasn't able to book that appointment. The time slot might no longer be available.";
pub const BOOKING_STATUS_ERROR: &str =
    "I'm having trouble booking the appointment right now. Please try again in a moment.";
pub const BOOKING_ERROR: &str = "I encountered an error while booking your appointment. \
Let me try again or suggest a different time.";

pub const DATES_NONE: &str = "I don't have any available dates in the near future. \
Let me check with management and get back to you.";
pub const DATES_REFUSED: &str = "I'm having trouble getting available dates right now.";
pub const DATES_STATUS_ERROR: &str =
    "I'm experiencing technical difficulties. Please try again shortly.";
pub const DATES_ERROR: &str = "I'm having trouble accessing the calendar system. \
Would you like me to take your information and have someone call you back?";

/// A viewing the caller asked for, in the words the model passed along.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewingRequest {
    pub guest_name: String,
    pub guest_phone: String,
    pub guest_email: String,
    /// `YYYY-MM-DD`.
    pub date: String,
    /// `2:00 PM` or `14:00`.
    pub time: String,
    pub notes: String,
}

/// Client for the backend's agent calendar endpoints.
#[derive(Debug, Clone)]
pub struct BookingClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    utc_offset: String,
}

impl BookingClient {
    pub fn new(http: reqwest::Client, config: &CalendarApiConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.timeout_seconds),
            utc_offset: config.utc_offset.clone(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/agent/{path}", self.base_url)
    }

    /// Lists open times on `date`.
    pub async fn check_availability(&self, date: &str, duration: u32) -> String {
        let request = AvailabilityRequest {
            date: date.to_string(),
            duration,
        };
        let response = self
            .http
            .post(self.endpoint("check-availability"))
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await;

        let result = match response {
            Ok(r) if r.status() == StatusCode::OK => r.json::<AgentAvailabilityResponse>().await,
            Ok(r) => {
                error!(status = %r.status(), "availability check rejected");
                return AVAILABILITY_STATUS_ERROR.to_string();
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(data) if data.success => {
                if data.available_times.is_empty() {
                    format!(
                        "I don't have any available appointment slots on {date}. \
Let me suggest some other dates that might work."
                    )
                } else {
                    let times: Vec<&str> = data
                        .available_times
                        .iter()
                        .take(MAX_SPOKEN_TIMES)
                        .map(String::as_str)
                        .collect();
                    format!(
                        "I have these times available on {date}: {}. Which time works best for you?",
                        times.join(", ")
                    )
                }
            }
            Ok(data) => non_empty_or(data.message, AVAILABILITY_UNKNOWN),
            Err(e) => {
                error!(error = %e, "error checking calendar availability");
                AVAILABILITY_ERROR.to_string()
            }
        }
    }

    /// Books a one-hour viewing.
    pub async fn book_viewing(&self, viewing: &ViewingRequest) -> String {
        let Some(start) = parse_slot(&viewing.date, &viewing.time) else {
            error!(date = %viewing.date, time = %viewing.time, "unparseable viewing time");
            return BOOKING_ERROR.to_string();
        };
        let end = start + ChronoDuration::hours(1);

        let request = BookingRequest {
            guest_name: viewing.guest_name.clone(),
            guest_phone: viewing.guest_phone.clone(),
            guest_email: viewing.guest_email.clone(),
            start_time: self.with_offset(start),
            end_time: self.with_offset(end),
            title: None,
            description: format!("Property viewing appointment. {}", viewing.notes)
                .trim()
                .to_string(),
        };

        let response = self
            .http
            .post(self.endpoint("book-appointment"))
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await;

        let result = match response {
            Ok(r) if r.status() == StatusCode::OK => r.json::<AgentBookingResponse>().await,
            Ok(r) => {
                error!(status = %r.status(), "booking rejected");
                return BOOKING_STATUS_ERROR.to_string();
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(data) if data.success => {
                info!(event_id = ?data.event_id, "viewing booked");
                let mut line = format!(
                    "Perfect! I've booked your property viewing appointment for {}. ",
                    start.format("%A, %B %d at %I:%M %p")
                );
                if !viewing.guest_email.is_empty() {
                    line.push_str("You'll receive a calendar invitation with all the details. ");
                }
                line.push_str("We'll see you then! Is there anything else I can help you with?");
                line
            }
            Ok(data) => non_empty_or(data.message.unwrap_or_default(), BOOKING_REFUSED),
            Err(e) => {
                error!(error = %e, "error booking appointment");
                BOOKING_ERROR.to_string()
            }
        }
    }

    /// Lists the next bookable days.
    pub async fn available_dates(&self) -> String {
        let response = self
            .http
            .get(self.endpoint("available-dates"))
            .timeout(self.timeout)
            .send()
            .await;

        let result = match response {
            Ok(r) if r.status() == StatusCode::OK => r.json::<AgentDatesResponse>().await,
            Ok(r) => {
                error!(status = %r.status(), "available dates rejected");
                return DATES_STATUS_ERROR.to_string();
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(data) if data.success && data.available_dates.is_empty() => DATES_NONE.to_string(),
            Ok(data) if data.success => {
                let dates: Vec<&str> = data
                    .available_dates
                    .iter()
                    .take(MAX_SPOKEN_DATES)
                    .map(|d| d.display.as_str())
                    .collect();
                format!(
                    "Here are the upcoming dates available for property viewings: {}. \
Which date interests you?",
                    dates.join(", ")
                )
            }
            Ok(_) => DATES_REFUSED.to_string(),
            Err(e) => {
                error!(error = %e, "error getting available dates");
                DATES_ERROR.to_string()
            }
        }
    }

    fn with_offset(&self, at: NaiveDateTime) -> String {
        format!("{}{}", at.format("%Y-%m-%dT%H:%M:%S"), self.utc_offset)
    }
}

fn non_empty_or(message: String, fallback: &str) -> String {
    if message.trim().is_empty() {
        fallback.to_string()
    } else {
        message
    }
}

/// Combines a `YYYY-MM-DD` date with a spoken time.
///
/// Accepts `2:00 PM`, `14:00`, and a bare hour such as `14`.
pub fn parse_slot(date: &str, time: &str) -> Option<NaiveDateTime> {
    let day = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").ok()?;
    let time = time.trim().to_ascii_uppercase();

    let parsed = if time.contains("AM") || time.contains("PM") {
        NaiveTime::parse_from_str(&time, "%I:%M %p").ok()
    } else {
        NaiveTime::parse_from_str(&time, "%H:%M").ok()
    };

    let at = match parsed {
        Some(t) => t,
        None => {
            let hour: u32 = time.split(':').next()?.trim().parse().ok()?;
            NaiveTime::from_hms_opt(hour, 0, 0)?
        }
    };
    Some(day.and_time(at))
}
