//! Serde helpers for Unix-millisecond timestamps.
//!
//! Offline clients send dates as epoch milliseconds, RFC 3339 strings or
//! bare `YYYY-MM-DD` dates. Everything is stored as `i64` milliseconds.

use chrono::{DateTime, NaiveDate};
use serde::{de, Deserialize, Deserializer, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Int(i64),
    Float(f64),
    Text(String),
}

/// Parse a date string into Unix milliseconds.
pub fn parse_str(value: &str) -> Option<i64> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.timestamp_millis());
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis())
}

#[allow(clippy::cast_possible_truncation)]
fn from_raw<E: de::Error>(raw: RawTimestamp) -> Result<i64, E> {
    match raw {
        RawTimestamp::Int(value) => Ok(value),
        RawTimestamp::Float(value) if value.is_finite() => Ok(value.round() as i64),
        RawTimestamp::Float(value) => Err(E::custom(format!("invalid timestamp: {value}"))),
        RawTimestamp::Text(text) => {
            parse_str(&text).ok_or_else(|| E::custom(format!("invalid date: {text}")))
        }
    }
}

pub fn serialize<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_i64(*value)
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    from_raw(RawTimestamp::deserialize(deserializer)?)
}

/// Same as the parent module, for `Option<i64>` fields.
pub mod option {
    use super::{from_raw, RawTimestamp};
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(value: &Option<i64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => serializer.serialize_some(value),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<RawTimestamp>::deserialize(deserializer)?
            .map(from_raw)
            .transpose()
    }
}
