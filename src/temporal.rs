//! The ISO 8601 subset accepted for `date`, `time` and `datetime` fields.
//!
//! Values are validated against the real calendar and then normalized:
//! a `T` separator, `Z` spelled `+00:00`, fractional seconds padded or
//! truncated to microseconds.

use chrono::{FixedOffset, NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    error::TycoError,
    utils::{normalize_datetime, normalize_time},
};

static DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").unwrap());
static TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{2}):(\d{2}):(\d{2})(?:\.\d+)?$").unwrap());
static DATETIME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4}-\d{2}-\d{2})[T ](\d{2}:\d{2}:\d{2}(?:\.\d+)?)(Z|[+-]\d{2}:\d{2})?$")
        .unwrap()
});

fn invalid(kind: &str, text: &str) -> TycoError {
    TycoError::type_error(format!("Invalid {kind} literal '{text}'"))
}

fn number<T: std::str::FromStr>(digits: &str, kind: &str, text: &str) -> Result<T, TycoError> {
    digits.parse().map_err(|_| invalid(kind, text))
}

pub fn parse_date(text: &str) -> Result<String, TycoError> {
    let caps = DATE_RE
        .captures(text)
        .ok_or_else(|| invalid("date", text))?;
    let year = number::<i32>(&caps[1], "date", text)?;
    let month = number::<u32>(&caps[2], "date", text)?;
    let day = number::<u32>(&caps[3], "date", text)?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| invalid("date", text))?;
    Ok(text.to_string())
}

pub fn parse_time(text: &str) -> Result<String, TycoError> {
    let caps = TIME_RE
        .captures(text)
        .ok_or_else(|| invalid("time", text))?;
    let hour = number::<u32>(&caps[1], "time", text)?;
    let minute = number::<u32>(&caps[2], "time", text)?;
    let second = number::<u32>(&caps[3], "time", text)?;
    NaiveTime::from_hms_opt(hour, minute, second).ok_or_else(|| invalid("time", text))?;
    Ok(normalize_time(text))
}

pub fn parse_datetime(text: &str) -> Result<String, TycoError> {
    let caps = DATETIME_RE
        .captures(text)
        .ok_or_else(|| invalid("datetime", text))?;
    parse_date(&caps[1]).map_err(|_| invalid("datetime", text))?;
    parse_time(&caps[2]).map_err(|_| invalid("datetime", text))?;
    if let Some(offset) = caps.get(3).map(|m| m.as_str()).filter(|o| *o != "Z") {
        let sign = if offset.starts_with('-') { -1 } else { 1 };
        let hours = number::<i32>(&offset[1..3], "datetime", text)?;
        let minutes = number::<i32>(&offset[4..6], "datetime", text)?;
        if minutes >= 60 {
            return Err(invalid("datetime", text));
        }
        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
            .ok_or_else(|| invalid("datetime", text))?;
    }
    Ok(normalize_datetime(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn accepts_calendar_dates_only() {
        assert_eq!(parse_date("2024-02-29").unwrap(), "2024-02-29");
        let err = parse_date("2023-02-29").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
        assert!(parse_date("2024-13-01").is_err());
        assert!(parse_date("24-01-01").is_err());
    }

    #[test]
    fn times_are_padded_to_microseconds() {
        assert_eq!(parse_time("23:59:59.1").unwrap(), "23:59:59.100000");
        assert!(parse_time("24:00:00").is_err());
        assert!(parse_time("12:30").is_err());
    }

    #[test]
    fn datetimes_normalize_separator_and_offset() {
        assert_eq!(
            parse_datetime("2024-03-01 12:00:00Z").unwrap(),
            "2024-03-01T12:00:00+00:00"
        );
        assert_eq!(
            parse_datetime("2024-03-01T12:00:00-05:30").unwrap(),
            "2024-03-01T12:00:00-05:30"
        );
        assert_eq!(
            parse_datetime("2024-03-01T12:00:00").unwrap(),
            "2024-03-01T12:00:00"
        );
        assert!(parse_datetime("2024-03-01T12:00:00+02:75").is_err());
        assert!(parse_datetime("2024-02-30T12:00:00").is_err());
    }
}
