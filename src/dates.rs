use chrono::{Datelike, Days, NaiveDate};

use crate::models::DayReport;

pub const ALL_DAYS: [u8; 7] = [0, 1, 2, 3, 4, 5, 6];

const DAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// Shared column axis for the whole grid.
///
/// Explicit bounds win; otherwise the extents of `day_reports` fill in. The
/// walk is inclusive and keeps only dates whose weekday (0 = Sunday) is in
/// `days_of_week`, defaulting to every day. An inverted range yields nothing.
pub fn derive_dates(
    day_reports: &[DayReport],
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    days_of_week: Option<&[u8]>,
) -> Vec<NaiveDate> {
    let observed_start = day_reports.iter().map(|d| d.date).min();
    let observed_end = day_reports.iter().map(|d| d.date).max();

    let (Some(start), Some(end)) = (start_date.or(observed_start), end_date.or(observed_end))
    else {
        return Vec::new();
    };

    if start > end {
        return Vec::new();
    }

    let days = days_of_week.unwrap_or(&ALL_DAYS);
    let mut dates = Vec::new();
    let mut current = Some(start);

    while let Some(date) = current.filter(|d| *d <= end) {
        if days.contains(&weekday_index(date)) {
            dates.push(date);
        }
        current = date.checked_add_days(Days::new(1));
    }

    dates
}

pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

pub fn day_name(day: u8) -> Option<&'static str> {
    DAY_NAMES.get(day as usize).copied()
}

/// Accepts `0`-`6` or a day name prefix of at least three letters.
pub fn parse_weekday(value: &str) -> Option<u8> {
    let value = value.trim();
    if let Ok(number) = value.parse::<u8>() {
        return (number < 7).then_some(number);
    }

    let lower = value.to_lowercase();
    if lower.len() < 3 {
        return None;
    }

    DAY_NAMES
        .iter()
        .position(|name| name.to_lowercase().starts_with(&lower))
        .map(|index| index as u8)
}
