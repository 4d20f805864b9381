//! Date dimension generation
//!
//! Date keys are content-derived (`YYYYMMDD`), so a calendar day always maps
//! to the same surrogate key regardless of when it was first generated.

use chrono::{Datelike, NaiveDate, Weekday};
use medallion_types::{DimensionKind, DimensionRow, FieldValue, SurrogateKey};
use std::collections::BTreeMap;

/// Source tag recorded on generated date rows
pub const CALENDAR_SOURCE: &str = "calendar";

/// `YYYYMMDD` key of a calendar day
pub fn date_key(date: NaiveDate) -> SurrogateKey {
    let key = date.year() as i64 * 10_000 + date.month() as i64 * 100 + date.day() as i64;
    SurrogateKey(key as u64)
}

/// Natural key of a calendar day
pub fn date_natural_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn month_name(month: u32) -> &'static str {
    match month {
        1 => "January",
        2 => "February",
        3 => "March",
        4 => "April",
        5 => "May",
        6 => "June",
        7 => "July",
        8 => "August",
        9 => "September",
        10 => "October",
        11 => "November",
        12 => "December",
        _ => "",
    }
}

fn day_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Build the date dimension row of one calendar day
pub fn calendar_row(date: NaiveDate) -> DimensionRow {
    let weekday = date.weekday();
    let mut attributes = BTreeMap::new();
    attributes.insert("full_date".to_string(), FieldValue::Date(date));
    attributes.insert("year".to_string(), FieldValue::Integer(date.year() as i64));
    attributes.insert("month".to_string(), FieldValue::Integer(date.month() as i64));
    attributes.insert(
        "month_name".to_string(),
        FieldValue::Text(month_name(date.month()).to_string()),
    );
    attributes.insert("day".to_string(), FieldValue::Integer(date.day() as i64));
    attributes.insert(
        "day_of_week".to_string(),
        FieldValue::Integer(weekday.number_from_monday() as i64),
    );
    attributes.insert(
        "day_name".to_string(),
        FieldValue::Text(day_name(weekday).to_string()),
    );
    attributes.insert(
        "quarter".to_string(),
        FieldValue::Integer(((date.month() - 1) / 3 + 1) as i64),
    );
    attributes.insert(
        "is_weekend".to_string(),
        FieldValue::Bool(matches!(weekday, Weekday::Sat | Weekday::Sun)),
    );

    DimensionRow {
        kind: DimensionKind::Date,
        surrogate_key: date_key(date),
        natural_key: date_natural_key(date),
        attributes,
        is_active: true,
        source_file: CALENDAR_SOURCE.to_string(),
        source_timestamp: date.and_time(chrono::NaiveTime::MIN).and_utc(),
        source_row: 0,
    }
}

/// Every day from `start` to `end`, inclusive
pub fn date_range(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |d| *d <= end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_key() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 3).unwrap();
        assert_eq!(date_key(date), SurrogateKey(20240503));
        assert_eq!(date_natural_key(date), "2024-05-03");
    }

    #[test]
    fn test_calendar_attributes() {
        // 2024-06-01 was a Saturday
        let row = calendar_row(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert_eq!(row.attribute("day_of_week"), Some(&FieldValue::Integer(6)));
        assert_eq!(row.display("day_name"), "Saturday");
        assert_eq!(row.display("month_name"), "June");
        assert_eq!(row.attribute("quarter"), Some(&FieldValue::Integer(2)));
        assert_eq!(row.attribute("is_weekend"), Some(&FieldValue::Bool(true)));
    }

    #[test]
    fn test_date_range_inclusive() {
        let start = NaiveDate::from_ymd_opt(2024, 2, 27).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let days: Vec<_> = date_range(start, end).collect();
        assert_eq!(days.len(), 4);
        assert_eq!(days[2], NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(date_range(end, start).count(), 0);
    }
}
