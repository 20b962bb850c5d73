//! Wire formats for calendar dates, times of day and loosely typed lists.
//!
//! Dates are accepted as `YYYY-MM-DD`, `DD-MM-YYYY` or an RFC 3339 timestamp
//! (the date part is kept) and always written as `YYYY-MM-DD`. Times are
//! accepted as `HH:MM` or `HH:MM:SS` and written as `HH:MM`; seconds are
//! dropped on input so every stored time is a whole minute.

use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Deserializer};

use clinic_shared::errors::{AppError, AppResult, ErrorCode};

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d-%m-%Y"];
const TIME_FORMATS: [&str; 2] = ["%H:%M", "%H:%M:%S"];

pub fn parse_date(raw: &str) -> AppResult<NaiveDate> {
    let raw = raw.trim();
    let day = raw.split_once('T').map(|(d, _)| d).unwrap_or(raw);
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(day, fmt).ok())
        .ok_or_else(|| {
            AppError::new(ErrorCode::ValidationError, format!("invalid date '{raw}', expected YYYY-MM-DD"))
        })
}

pub fn parse_time(raw: &str) -> AppResult<NaiveTime> {
    let raw = raw.trim();
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(raw, fmt).ok())
        .map(to_minute)
        .ok_or_else(|| AppError::new(ErrorCode::ValidationError, format!("invalid time '{raw}', expected HH:MM")))
}

/// Rounds a time of day down to its minute.
pub fn to_minute(time: NaiveTime) -> NaiveTime {
    time.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(time)
}

/// `HH:MM` serde representation for `NaiveTime`.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_time(&raw).map_err(serde::de::Error::custom)
    }
}

/// `YYYY-MM-DD` serde representation for `NaiveDate`, lenient on input.
pub mod day {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&date.format("%Y-%m-%d").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_date(&raw).map_err(serde::de::Error::custom)
    }
}

/// Optional variant of [`day`]; `null`, a missing key and `""` all mean none.
pub mod opt_day {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
        match date {
            Some(date) => super::day::serialize(date, s),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        match Option::<String>::deserialize(d)? {
            Some(raw) if !raw.trim().is_empty() => {
                super::parse_date(&raw).map(Some).map_err(serde::de::Error::custom)
            }
            _ => Ok(None),
        }
    }
}

/// Accepts either a single string or a list of strings. A lone empty string
/// yields an empty list.
pub fn string_or_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(d)? {
        Some(OneOrMany::One(s)) if s.trim().is_empty() => Vec::new(),
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(list)) => list,
        None => Vec::new(),
    })
}
