use std::cmp::Reverse;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::timestamp::parse_timestamp;
use crate::view::{SearchField, ViewRecord};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Timestamp,
    Sequence,
    Comments,
    Role,
    Id,
    Rating,
    User,
    Message,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "timestamp" | "time" | "date" => Ok(SortKey::Timestamp),
            "sequence" => Ok(SortKey::Sequence),
            "comments" | "comment_count" => Ok(SortKey::Comments),
            "role" => Ok(SortKey::Role),
            "id" => Ok(SortKey::Id),
            "rating" | "feedback" => Ok(SortKey::Rating),
            "user" => Ok(SortKey::User),
            "message" => Ok(SortKey::Message),
            other => Err(format!("unknown sort key: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "oldest" | "asc" | "ascending" => Ok(SortDirection::Ascending),
            "newest" | "recent" | "desc" | "descending" => Ok(SortDirection::Descending),
            other => Err(format!("unknown sort direction: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortSpec {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(key: SortKey, direction: SortDirection) -> Self {
        Self { key, direction }
    }

    /// Timestamp order as named in the UI (`oldest`, `newest`, ...).
    pub fn by_time(order: &str) -> Result<Self, String> {
        Ok(Self::new(SortKey::Timestamp, order.parse()?))
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum SortValue {
    Number(i64),
    Text(String),
}

fn sort_value<R: ViewRecord>(record: &R, key: SortKey) -> SortValue {
    match key {
        SortKey::Timestamp => SortValue::Number(
            record
                .timestamp()
                .and_then(parse_timestamp)
                .map(|dt| dt.timestamp_millis())
                .unwrap_or_else(|| record.sequence()),
        ),
        SortKey::Sequence => SortValue::Number(record.sequence()),
        SortKey::Comments => SortValue::Number(record.comments().len() as i64),
        SortKey::Role => SortValue::Text(
            record
                .role()
                .map(|r| r.as_str().to_string())
                .unwrap_or_default(),
        ),
        SortKey::Id => SortValue::Text(record.record_id().to_lowercase()),
        SortKey::Rating => SortValue::Text(
            record
                .rating()
                .map(|r| r.as_str().to_string())
                .unwrap_or_default(),
        ),
        SortKey::User => SortValue::Text(record.user_id().unwrap_or_default().to_lowercase()),
        SortKey::Message => SortValue::Text(record.field_text(SearchField::Message).to_lowercase()),
    }
}

/// Stable sort on one key; equal keys fall back to `sequence`.
pub fn sort_records<R: ViewRecord>(records: &mut [R], spec: &SortSpec) {
    // cached so timestamps are parsed once per record
    match spec.direction {
        SortDirection::Ascending => {
            records.sort_by_cached_key(|r| (sort_value(r, spec.key), r.sequence()))
        }
        SortDirection::Descending => {
            records.sort_by_cached_key(|r| Reverse((sort_value(r, spec.key), r.sequence())))
        }
    }
}
