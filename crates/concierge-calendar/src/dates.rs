use chrono::{Datelike, Days, NaiveDate};
use concierge_types::AvailableDate;

/// Weekdays among the seven days after `today`.
pub fn upcoming_weekdays(today: NaiveDate) -> Vec<AvailableDate> {
    (1..=7)
        .filter_map(|i| today.checked_add_days(Days::new(i)))
        .filter(|date| date.weekday().num_days_from_monday() < 5)
        .map(|date| AvailableDate {
            date: date.format("%Y-%m-%d").to_string(),
            display: date.format("%A, %B %d").to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_today_and_weekends() {
        // A Friday.
        let today = NaiveDate::from_ymd_opt(2025, 8, 22).unwrap();
        let dates = upcoming_weekdays(today);

        let days: Vec<&str> = dates.iter().map(|d| d.date.as_str()).collect();
        assert_eq!(
            days,
            vec!["2025-08-25", "2025-08-26", "2025-08-27", "2025-08-28", "2025-08-29"]
        );
        assert_eq!(dates[0].display, "Monday, August 25");
    }
}
