use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
    #[default]
    Unknown,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::Unknown => "unknown",
        }
    }

    #[inline]
    pub fn is_user(&self) -> bool {
        matches!(self, Role::User)
    }

    #[inline]
    pub fn is_assistant(&self) -> bool {
        matches!(self, Role::Assistant)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reviewer verdict on an assistant response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    Good,
    Bad,
}

impl Rating {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Good => "good",
            Rating::Bad => "bad",
        }
    }

    /// Reads a rating off a raw JSON field. Anything but `good`/`bad` is no rating.
    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_str().and_then(|s| s.parse().ok())
    }

    /// Clicking the active rating again clears it.
    pub fn toggle(current: Option<Rating>, requested: Option<Rating>) -> Option<Rating> {
        if current == requested {
            None
        } else {
            requested
        }
    }
}

impl FromStr for Rating {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "good" => Ok(Rating::Good),
            "bad" => Ok(Rating::Bad),
            other => Err(format!("unknown rating: {other}")),
        }
    }
}

/// A chat message after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(default)]
    pub role: Role,
    /// Either plain text or a structured payload (e.g. `{"convo": ...}`).
    #[serde(default)]
    pub content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub sequence: i64,
    #[serde(default)]
    pub comments: Vec<String>,
    #[serde(default)]
    pub feedback: Option<Rating>,
    /// Agents or functions named on the message, when the export records them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub agents: Vec<String>,
}

/// The id a comment or rating is stored under. Ids without a `_` are not composite
/// and are replaced by `<user>_<session>_<index>`.
pub fn canonical_message_id(stored: &str, user_id: &str, session_id: &str, index: usize) -> String {
    if stored.contains('_') {
        stored.to_string()
    } else {
        format!("{user_id}_{session_id}_{index}")
    }
}

impl Message {
    pub fn user_segment(&self) -> Option<&str> {
        self.id.split('_').next().filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn toggle_clears_same_rating() {
        assert_eq!(Rating::toggle(Some(Rating::Good), Some(Rating::Good)), None);
        assert_eq!(
            Rating::toggle(Some(Rating::Good), Some(Rating::Bad)),
            Some(Rating::Bad)
        );
        assert_eq!(Rating::toggle(None, Some(Rating::Bad)), Some(Rating::Bad));
    }

    #[test]
    fn rating_from_loose_values() {
        assert_eq!(Rating::from_value(&json!("GOOD")), Some(Rating::Good));
        assert_eq!(Rating::from_value(&json!("neutral")), None);
        assert_eq!(Rating::from_value(&json!(1)), None);
    }

    #[test]
    fn message_defaults_on_sparse_json() {
        let msg: Message = serde_json::from_value(json!({"id": "u_s_0"})).unwrap();
        assert_eq!(msg.role, Role::Unknown);
        assert!(msg.comments.is_empty());
        assert_eq!(msg.user_segment(), Some("u"));
    }
}
