//! Calendar endpoints: the raw slot/booking API and the agent-facing
//! variants that answer in sentences the agent can speak.
//!
//! Calendar failures are reported in the body with `success: false` so a
//! flaky calendar never looks like a server crash to the caller.

use crate::api::ApiError;
use crate::AppState;
use axum::extract::{Extension, Json, Query};
use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use concierge_calendar::{
    upcoming_weekdays, CalendarService, CreatedEvent, TimeSlot, UpcomingEvent, MAX_SLOT_MINUTES,
    MAX_UPCOMING_DAYS,
};
use concierge_types::{
    AgentAvailabilityResponse, AgentBookingResponse, AgentDatesResponse, AvailabilityRequest,
    BookingRequest,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const NOT_CONFIGURED: &str = "Google Calendar not configured";
const AGENT_TIMES_LIMIT: usize = 5;

const AGENT_CALENDAR_TROUBLE: &str = "I'm having trouble accessing the calendar right now.";
const AGENT_BAD_DATE: &str =
    "I didn't catch which day that was. Could you give me the date again?";
const AGENT_BOOKING_TROUBLE: &str = "I'm having trouble booking the appointment right now.";
const AGENT_BOOKING_REFUSED: &str =
    "I wasn't able to book that appointment. The time slot might no longer be available.";

fn default_duration() -> i64 {
    60
}

fn default_days() -> i64 {
    7
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub date: String,
    #[serde(default = "default_duration")]
    pub duration: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AvailabilityResponse {
    pub success: bool,
    pub date: String,
    pub available_slots: Vec<TimeSlot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BookResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_details: Option<CreatedEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpcomingQuery {
    #[serde(default = "default_days")]
    pub days: i64,
}

#[derive(Debug, Serialize)]
pub struct UpcomingResponse {
    pub success: bool,
    pub events: Vec<UpcomingEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

fn calendar(state: &AppState) -> Result<&CalendarService, String> {
    state
        .calendar
        .as_deref()
        .ok_or_else(|| NOT_CONFIGURED.to_string())
}

async fn slots_for(state: &AppState, date: NaiveDate, duration: i64) -> Result<Vec<TimeSlot>, String> {
    let calendar = calendar(state)?;
    calendar
        .availability_for_date(date, duration)
        .await
        .map_err(|e| {
            tracing::error!(%date, error = %e, "availability lookup failed");
            e.to_string()
        })
}

async fn book(state: &AppState, booking: &BookingRequest) -> Result<CreatedEvent, String> {
    let calendar = calendar(state)?;
    calendar.create_event(booking).await.map_err(|e| {
        tracing::error!(guest = %booking.guest_name, error = %e, "event creation failed");
        e.to_string()
    })
}

/// Handler for `GET /api/calendar/availability`.
pub async fn availability_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, ApiError> {
    let date = parse_date(&query.date)
        .ok_or_else(|| ApiError::BadRequest("date must be YYYY-MM-DD".to_string()))?;
    if !(1..=MAX_SLOT_MINUTES).contains(&query.duration) {
        return Err(ApiError::BadRequest(format!(
            "duration must be between 1 and {MAX_SLOT_MINUTES} minutes"
        )));
    }

    let response = match slots_for(&state, date, query.duration).await {
        Ok(slots) => AvailabilityResponse {
            success: true,
            date: query.date,
            available_slots: slots,
            error: None,
        },
        Err(error) => AvailabilityResponse {
            success: false,
            date: query.date,
            available_slots: Vec::new(),
            error: Some(error),
        },
    };
    Ok(Json(response))
}

/// Handler for `POST /api/calendar/book`.
pub async fn book_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<BookingRequest>,
) -> Json<BookResponse> {
    match book(&state, &payload).await {
        Ok(event) => {
            tracing::info!(event_id = %event.event_id, "viewing booked");
            Json(BookResponse {
                success: true,
                event_details: Some(event),
                error: None,
            })
        }
        Err(error) => Json(BookResponse {
            success: false,
            event_details: None,
            error: Some(error),
        }),
    }
}

/// Handler for `GET /api/calendar/upcoming`.
pub async fn upcoming_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<UpcomingQuery>,
) -> Result<Json<UpcomingResponse>, ApiError> {
    if query.days > MAX_UPCOMING_DAYS {
        return Err(ApiError::BadRequest(format!("days must be at most {MAX_UPCOMING_DAYS}")));
    }

    let result = match calendar(&state) {
        Ok(calendar) => calendar
            .upcoming_events(query.days.max(1))
            .await
            .map_err(|e| e.to_string()),
        Err(error) => Err(error),
    };

    Ok(Json(match result {
        Ok(events) => UpcomingResponse {
            success: true,
            events,
            error: None,
        },
        Err(error) => UpcomingResponse {
            success: false,
            events: Vec::new(),
            error: Some(error),
        },
    }))
}

/// Handler for `POST /api/agent/check-availability`.
pub async fn agent_check_availability_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<AvailabilityRequest>,
) -> Json<AgentAvailabilityResponse> {
    let Some(date) = parse_date(&payload.date) else {
        return Json(AgentAvailabilityResponse {
            success: false,
            message: AGENT_BAD_DATE.to_string(),
            available_times: Vec::new(),
        });
    };

    Json(match slots_for(&state, date, i64::from(payload.duration)).await {
        Ok(slots) if slots.is_empty() => AgentAvailabilityResponse {
            success: true,
            message: format!(
                "I don't have any available appointment slots on {}. Would you like to try another date?",
                payload.date
            ),
            available_times: Vec::new(),
        },
        Ok(slots) => {
            let times: Vec<String> = slots
                .into_iter()
                .take(AGENT_TIMES_LIMIT)
                .map(|slot| slot.time)
                .collect();
            AgentAvailabilityResponse {
                success: true,
                message: format!("I found {} available times on {}.", times.len(), payload.date),
                available_times: times,
            }
        }
        Err(_) => AgentAvailabilityResponse {
            success: false,
            message: AGENT_CALENDAR_TROUBLE.to_string(),
            available_times: Vec::new(),
        },
    })
}

fn spoken_start(start_time: &str) -> String {
    DateTime::parse_from_rfc3339(start_time)
        .map(|dt| dt.format("%A, %B %d at %I:%M %p").to_string())
        .unwrap_or_else(|_| start_time.to_string())
}

/// Handler for `POST /api/agent/book-appointment`.
pub async fn agent_book_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<BookingRequest>,
) -> Json<AgentBookingResponse> {
    if state.calendar.is_none() {
        return Json(AgentBookingResponse {
            success: false,
            message: Some(AGENT_BOOKING_TROUBLE.to_string()),
            event_id: None,
        });
    }

    Json(match book(&state, &payload).await {
        Ok(event) => AgentBookingResponse {
            success: true,
            message: Some(format!(
                "Perfect! I've booked your appointment for {}. You'll receive a confirmation if you provided an email.",
                spoken_start(&payload.start_time)
            )),
            event_id: Some(event.event_id),
        },
        Err(_) => AgentBookingResponse {
            success: false,
            message: Some(AGENT_BOOKING_REFUSED.to_string()),
            event_id: None,
        },
    })
}

fn local_offset(state: &AppState) -> FixedOffset {
    match &state.calendar {
        Some(calendar) => calendar.offset(),
        None => state
            .config
            .calendar
            .offset()
            .unwrap_or_else(|_| Utc.fix()),
    }
}

/// Handler for `GET /api/agent/available-dates`: weekdays in the next week.
pub async fn agent_available_dates_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Json<AgentDatesResponse> {
    let today = Utc::now().with_timezone(&local_offset(&state)).date_naive();
    Json(AgentDatesResponse {
        success: true,
        available_dates: upcoming_weekdays(today),
    })
}
