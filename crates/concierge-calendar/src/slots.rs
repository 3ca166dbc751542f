//! Turning free/busy data into bookable slots.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Timelike};
use serde::{Deserialize, Serialize};

const SLOT_STEP_MINUTES: i64 = 30;
const OPENING_HOUR: u32 = 9;
const CLOSING_HOUR: u32 = 18;
/// Most slots offered for one query.
pub const MAX_SLOTS: usize = 8;
/// Longest appointment that can be looked up, one full day.
pub const MAX_SLOT_MINUTES: i64 = 24 * 60;

/// A bookable appointment slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSlot {
    /// RFC 3339 start, in the calendar's local offset.
    pub start: String,
    pub end: String,
    /// Spoken form, e.g. `Tuesday, August 26 at 02:00 PM`.
    pub display: String,
    pub date: String,
    pub time: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusyInterval {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl BusyInterval {
    fn overlaps(&self, start: DateTime<FixedOffset>, end: DateTime<FixedOffset>) -> bool {
        start < self.end && end > self.start
    }
}

/// The whole local day `date` in `offset`.
pub fn day_window(
    date: NaiveDate,
    offset: FixedOffset,
) -> Option<(DateTime<FixedOffset>, DateTime<FixedOffset>)> {
    let start = date.and_hms_opt(0, 0, 0)?.and_local_timezone(offset).single()?;
    let end = start.checked_add_signed(Duration::days(1))?;
    Some((start, end))
}

/// Walks `[window_start, window_end)` in 30-minute steps and returns up to
/// [`MAX_SLOTS`] slots of `duration_minutes` that start within business
/// hours and do not overlap any busy interval. The duration is clamped to
/// `1..=`[`MAX_SLOT_MINUTES`].
pub fn free_slots(
    window_start: DateTime<FixedOffset>,
    window_end: DateTime<FixedOffset>,
    duration_minutes: i64,
    busy: &[BusyInterval],
) -> Vec<TimeSlot> {
    let duration = Duration::minutes(duration_minutes.clamp(1, MAX_SLOT_MINUTES));
    let step = Duration::minutes(SLOT_STEP_MINUTES);
    let mut slots = Vec::new();
    let mut current = window_start;

    while let Some(slot_end) = current.checked_add_signed(duration) {
        if slot_end > window_end {
            break;
        }
        let in_hours = (OPENING_HOUR..CLOSING_HOUR).contains(&current.hour());
        if in_hours && !busy.iter().any(|b| b.overlaps(current, slot_end)) {
            slots.push(TimeSlot {
                start: current.to_rfc3339(),
                end: slot_end.to_rfc3339(),
                display: current.format("%A, %B %d at %I:%M %p").to_string(),
                date: current.format("%Y-%m-%d").to_string(),
                time: current.format("%I:%M %p").to_string(),
            });
            if slots.len() >= MAX_SLOTS {
                break;
            }
        }
        match current.checked_add_signed(step) {
            Some(next) => current = next,
            None => break,
        }
    }

    slots
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pacific() -> FixedOffset {
        FixedOffset::west_opt(7 * 3600).unwrap()
    }

    fn at(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    #[test]
    fn empty_day_yields_first_eight_business_slots() {
        let date = NaiveDate::from_ymd_opt(2025, 8, 26).unwrap();
        let (start, end) = day_window(date, pacific()).unwrap();

        let slots = free_slots(start, end, 60, &[]);

        assert_eq!(slots.len(), MAX_SLOTS);
        assert_eq!(slots[0].start, "2025-08-26T09:00:00-07:00");
        assert_eq!(slots[0].end, "2025-08-26T10:00:00-07:00");
        assert_eq!(slots[0].display, "Tuesday, August 26 at 09:00 AM");
        assert_eq!(slots[0].time, "09:00 AM");
        assert_eq!(slots[0].date, "2025-08-26");
        assert_eq!(slots[7].start, "2025-08-26T12:30:00-07:00");
    }

    #[test]
    fn busy_intervals_are_skipped_across_offsets() {
        let start = at("2025-08-26T09:00:00-07:00");
        let end = at("2025-08-26T12:00:00-07:00");
        // 16:00Z..17:30Z is 09:00..10:30 Pacific.
        let busy = [BusyInterval {
            start: at("2025-08-26T16:00:00Z"),
            end: at("2025-08-26T17:30:00Z"),
        }];

        let slots = free_slots(start, end, 60, &busy);
        let starts: Vec<&str> = slots.iter().map(|s| s.time.as_str()).collect();
        assert_eq!(starts, vec!["10:30 AM", "11:00 AM"]);
    }

    #[test]
    fn no_slot_starts_outside_business_hours() {
        let start = at("2025-08-26T16:00:00-07:00");
        let end = at("2025-08-26T23:00:00-07:00");

        let slots = free_slots(start, end, 60, &[]);
        let starts: Vec<&str> = slots.iter().map(|s| s.time.as_str()).collect();
        assert_eq!(starts, vec!["04:00 PM", "04:30 PM", "05:00 PM", "05:30 PM"]);
    }

    #[test]
    fn window_shorter_than_duration_is_empty() {
        let start = at("2025-08-26T10:00:00-07:00");
        let end = at("2025-08-26T10:30:00-07:00");
        assert!(free_slots(start, end, 60, &[]).is_empty());
    }

    #[test]
    fn oversized_duration_is_clamped_to_a_day() {
        let start = at("2025-08-26T00:00:00-07:00");
        let end = at("2025-08-27T00:00:00-07:00");
        assert!(free_slots(start, end, i64::MAX, &[]).is_empty());

        let end = at("2025-08-28T00:00:00-07:00");
        let slots = free_slots(start, end, i64::MAX, &[]);
        assert_eq!(slots[0].start, "2025-08-26T09:00:00-07:00");
        assert_eq!(slots[0].end, "2025-08-27T09:00:00-07:00");
    }

    #[test]
    fn last_representable_day_has_no_window() {
        let offset = FixedOffset::east_opt(0).unwrap();
        assert!(day_window(NaiveDate::MAX, offset).is_none());
    }
}
