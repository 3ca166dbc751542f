use crate::auth::{ServiceAccountKey, TokenProvider};
use crate::config::CalendarConfig;
use crate::error::CalendarError;
use crate::slots::{day_window, free_slots, BusyInterval, TimeSlot};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, SecondsFormat, Utc};
use concierge_types::BookingRequest;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;

const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(15);
/// Furthest ahead the upcoming-events listing looks.
pub const MAX_UPCOMING_DAYS: i64 = 365;
const UPCOMING_MAX_RESULTS: u32 = 20;
const EMAIL_REMINDER_MINUTES: u32 = 24 * 60;
const POPUP_REMINDER_MINUTES: u32 = 60;

/// The calendar's answer to an insert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatedEvent {
    pub event_id: String,
    pub event_link: Option<String>,
    pub start_time: String,
    pub end_time: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpcomingEvent {
    pub id: String,
    pub summary: String,
    pub start: String,
    pub end: String,
    pub location: String,
    pub description: String,
}

#[derive(Deserialize)]
struct FreeBusyResponse {
    #[serde(default)]
    calendars: HashMap<String, FreeBusyCalendar>,
}

#[derive(Deserialize)]
struct FreeBusyCalendar {
    #[serde(default)]
    busy: Vec<RawInterval>,
}

#[derive(Deserialize)]
struct RawInterval {
    start: String,
    end: String,
}

#[derive(Deserialize, Default)]
struct EventTime {
    #[serde(rename = "dateTime")]
    date_time: Option<String>,
    date: Option<String>,
}

impl EventTime {
    fn into_string(self) -> String {
        self.date_time.or(self.date).unwrap_or_default()
    }
}

#[derive(Deserialize)]
struct GoogleEvent {
    id: String,
    #[serde(rename = "htmlLink")]
    html_link: Option<String>,
    summary: Option<String>,
    #[serde(default)]
    start: EventTime,
    #[serde(default)]
    end: EventTime,
    location: Option<String>,
    description: Option<String>,
}

#[derive(Deserialize)]
struct EventList {
    #[serde(default)]
    items: Vec<GoogleEvent>,
}

/// Client for one Google calendar.
#[derive(Debug)]
pub struct CalendarService {
    config: CalendarConfig,
    offset: FixedOffset,
    http: reqwest::Client,
    tokens: TokenProvider,
}

impl CalendarService {
    /// Loads the service account key named by `config`.
    pub fn from_config(config: CalendarConfig) -> Result<Self, CalendarError> {
        let key = ServiceAccountKey::load(&config)?;
        Self::with_key(config, key)
    }

    pub fn with_key(config: CalendarConfig, key: ServiceAccountKey) -> Result<Self, CalendarError> {
        let offset = config.offset()?;
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            tokens: TokenProvider::new(key, http.clone()),
            config,
            offset,
            http,
        })
    }

    pub fn config(&self) -> &CalendarConfig {
        &self.config
    }

    /// Offset the calendar's local times are rendered in.
    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Today's date in the calendar's offset.
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.offset).date_naive()
    }

    /// Open slots of `duration_minutes` between `start` and `end`.
    pub async fn availability(
        &self,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
        duration_minutes: i64,
    ) -> Result<Vec<TimeSlot>, CalendarError> {
        let busy = self.busy_intervals(start, end).await?;
        let slots = free_slots(start, end, duration_minutes, &busy);
        tracing::debug!(
            busy = busy.len(),
            slots = slots.len(),
            "computed calendar availability"
        );
        Ok(slots)
    }

    pub async fn availability_for_date(
        &self,
        date: NaiveDate,
        duration_minutes: i64,
    ) -> Result<Vec<TimeSlot>, CalendarError> {
        let (start, end) = day_window(date, self.offset)
            .ok_or_else(|| CalendarError::InvalidTime(date.to_string()))?;
        self.availability(start, end, duration_minutes).await
    }

    async fn busy_intervals(
        &self,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Result<Vec<BusyInterval>, CalendarError> {
        let body = json!({
            "timeMin": start.to_rfc3339(),
            "timeMax": end.to_rfc3339(),
            "timeZone": self.config.time_zone,
            "items": [{ "id": self.config.calendar_id }],
        });

        let response = self
            .http
            .post(self.url(&["freeBusy"])?)
            .bearer_auth(self.tokens.access_token().await?)
            .json(&body)
            .send()
            .await?;
        let free_busy: FreeBusyResponse = ensure_success(response).await?.json().await?;

        free_busy
            .calendars
            .get(&self.config.calendar_id)
            .map(|c| c.busy.as_slice())
            .unwrap_or_default()
            .iter()
            .map(|raw| -> Result<BusyInterval, CalendarError> {
                Ok(BusyInterval {
                    start: parse_time(&raw.start)?,
                    end: parse_time(&raw.end)?,
                })
            })
            .collect()
    }

    /// Inserts a viewing. The guest is invited (and notified) when an email is given.
    pub async fn create_event(
        &self,
        booking: &BookingRequest,
    ) -> Result<CreatedEvent, CalendarError> {
        parse_time(&booking.start_time)?;
        parse_time(&booking.end_time)?;

        let has_email = !booking.guest_email.trim().is_empty();
        let mut event = json!({
            "summary": booking.summary(),
            "location": self.config.location,
            "description": event_description(booking),
            "start": { "dateTime": booking.start_time, "timeZone": self.config.time_zone },
            "end": { "dateTime": booking.end_time, "timeZone": self.config.time_zone },
            "reminders": {
                "useDefault": false,
                "overrides": [
                    { "method": "email", "minutes": EMAIL_REMINDER_MINUTES },
                    { "method": "popup", "minutes": POPUP_REMINDER_MINUTES },
                ],
            },
        });
        if has_email {
            event["attendees"] = json!([
                { "email": booking.guest_email, "displayName": booking.guest_name }
            ]);
        }

        let response = self
            .http
            .post(self.url(&["calendars", &self.config.calendar_id, "events"])?)
            .query(&[("sendUpdates", if has_email { "all" } else { "none" })])
            .bearer_auth(self.tokens.access_token().await?)
            .json(&event)
            .send()
            .await?;
        let created: GoogleEvent = ensure_success(response).await?.json().await?;

        tracing::info!(event_id = %created.id, "calendar event created");
        Ok(CreatedEvent {
            event_id: created.id,
            event_link: created.html_link,
            start_time: created.start.into_string(),
            end_time: created.end.into_string(),
            summary: created.summary.unwrap_or_else(|| booking.summary()),
        })
    }

    /// Single events in the next `days` days, earliest first. `days` is
    /// clamped to `0..=`[`MAX_UPCOMING_DAYS`].
    pub async fn upcoming_events(&self, days: i64) -> Result<Vec<UpcomingEvent>, CalendarError> {
        let now = Utc::now();
        let until = now + Duration::days(days.clamp(0, MAX_UPCOMING_DAYS));
        let query = [
            ("timeMin", now.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("timeMax", until.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("maxResults", UPCOMING_MAX_RESULTS.to_string()),
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
        ];

        let response = self
            .http
            .get(self.url(&["calendars", &self.config.calendar_id, "events"])?)
            .query(&query)
            .bearer_auth(self.tokens.access_token().await?)
            .send()
            .await?;
        let list: EventList = ensure_success(response).await?.json().await?;

        Ok(list
            .items
            .into_iter()
            .map(|event| UpcomingEvent {
                id: event.id,
                summary: event.summary.unwrap_or_else(|| "No Title".to_string()),
                start: event.start.into_string(),
                end: event.end.into_string(),
                location: event.location.unwrap_or_default(),
                description: event.description.unwrap_or_default(),
            })
            .collect())
    }

    fn url(&self, segments: &[&str]) -> Result<reqwest::Url, CalendarError> {
        let mut url = reqwest::Url::parse(&self.config.api_base)
            .map_err(|e| CalendarError::Config(format!("api_base: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| CalendarError::Config("api_base cannot be a base URL".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

/// Event body text listing the guest's details.
pub fn event_description(booking: &BookingRequest) -> String {
    let mut text = String::from("Newport Beach Rental Inquiry\n\n");
    for (label, value) in [
        ("Guest", &booking.guest_name),
        ("Phone", &booking.guest_phone),
        ("Email", &booking.guest_email),
    ] {
        if !value.is_empty() {
            text.push_str(&format!("{label}: {value}\n"));
        }
    }
    if !booking.description.is_empty() {
        text.push_str(&format!("\nNotes: {}", booking.description));
    }
    text
}

fn parse_time(value: &str) -> Result<DateTime<FixedOffset>, CalendarError> {
    DateTime::parse_from_rfc3339(value).map_err(|_| CalendarError::InvalidTime(value.to_string()))
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, CalendarError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    tracing::warn!(status = status.as_u16(), "Calendar API request failed");
    Err(CalendarError::Api {
        status: status.as_u16(),
        message,
    })
}
