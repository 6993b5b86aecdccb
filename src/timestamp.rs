use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

/// Epoch values above this are treated as milliseconds.
const MILLIS_THRESHOLD: u64 = 100_000_000_000;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Best-effort parse of the timestamp strings found in chat exports.
///
/// Accepts RFC 3339, RFC 2822, naive ISO date-times (read as UTC), bare dates and
/// integer epochs. Returns `None` for anything else.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|n| Utc.from_utc_datetime(&n));
    }
    raw.parse::<i64>().ok().and_then(from_epoch)
}

/// Epoch seconds or milliseconds to a UTC instant.
pub fn from_epoch(value: i64) -> Option<DateTime<Utc>> {
    if value.unsigned_abs() > MILLIS_THRESHOLD {
        Utc.timestamp_millis_opt(value).single()
    } else {
        Utc.timestamp_opt(value, 0).single()
    }
}

/// Render a raw timestamp field as display text.
///
/// Strings pass through untouched, Mongo extended JSON (`{"$date": ..}`, `{"date": ..}`,
/// `{"$numberLong": ..}`) is unwrapped and numbers become RFC 3339.
pub fn timestamp_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(from_epoch)
            .map(|dt| dt.to_rfc3339()),
        Value::Object(map) => ["$date", "date", "$numberLong"]
            .iter()
            .find_map(|key| map.get(*key))
            .and_then(|inner| match inner {
                Value::String(s) => s
                    .parse::<i64>()
                    .ok()
                    .and_then(from_epoch)
                    .map(|dt| dt.to_rfc3339())
                    .or_else(|| Some(s.clone())),
                other => timestamp_text(other),
            }),
        _ => None,
    }
}
