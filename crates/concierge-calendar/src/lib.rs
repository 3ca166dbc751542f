//! Google Calendar booking for property viewings.
//!
//! Authenticates as a service account, turns free/busy data into bookable
//! slots inside business hours, and creates events with reminders and an
//! optional guest invitation.

pub mod auth;
pub mod config;
pub mod dates;
pub mod error;
pub mod service;
pub mod slots;

pub use auth::{ServiceAccountKey, TokenProvider, CALENDAR_SCOPE};
pub use config::CalendarConfig;
pub use dates::upcoming_weekdays;
pub use error::CalendarError;
pub use service::{
    event_description, CalendarService, CreatedEvent, UpcomingEvent, MAX_UPCOMING_DAYS,
};
pub use slots::{day_window, free_slots, BusyInterval, TimeSlot, MAX_SLOTS, MAX_SLOT_MINUTES};
