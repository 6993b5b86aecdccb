//! Typed view over the `user -> session -> payload` archive the extraction script prints.

mod source;

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::model::user::UNKNOWN_TIME;
use crate::model::{
    canonical_message_id, derive_interactions, Interaction, Message, SessionSummary, UserSummary,
};
use crate::normalize::{detect_shape, locate_history, normalize_history, HistoryShape, SessionRef};

pub use source::{ArchiveSource, SourceError};

/// One session as stored in the archive.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionRecord {
    /// Raw history in whatever shape the export used.
    pub history: Value,
    pub projects: Vec<Value>,
    pub tasks: Vec<Value>,
    pub email_thread_chain: Vec<Value>,
    pub email_thread_id: Option<Value>,
}

impl SessionRecord {
    fn from_value(user_id: &str, session_id: &str, value: Value) -> Self {
        let mut record = match value {
            Value::Object(mut map) if map.contains_key("chat_history") => Self {
                history: map.remove("chat_history").unwrap_or(Value::Null),
                projects: take_list(&mut map, "projects"),
                tasks: take_list(&mut map, "tasks"),
                email_thread_chain: take_list(&mut map, "email_thread_chain"),
                email_thread_id: map.remove("email_thread_id").filter(|v| !v.is_null()),
            },
            // bare histories, or objects the normalizer has to search
            other => Self {
                history: other,
                ..Self::default()
            },
        };
        annotate_flat_history(&mut record.history, user_id, session_id);
        record
    }

    fn raw_len(&self) -> usize {
        locate_history(&self.history).map(Vec::len).unwrap_or(0)
    }
}

fn take_list(map: &mut Map<String, Value>, key: &str) -> Vec<Value> {
    match map.remove(key) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

/// Flat histories get positional `message_id`/`sequence` where they carry none, so the
/// ids line up with the interaction ids derived from the same positions.
fn annotate_flat_history(history: &mut Value, user_id: &str, session_id: &str) {
    let Value::Array(items) = history else {
        return;
    };
    if detect_shape(items) != HistoryShape::Flat {
        return;
    }
    for (index, item) in items.iter_mut().enumerate() {
        if let Value::Object(obj) = item {
            let has_id = ["id", "message_id"]
                .iter()
                .any(|k| obj.get(*k).map(|v| !v.is_null()).unwrap_or(false));
            if !has_id {
                obj.insert(
                    "message_id".into(),
                    Value::String(format!("{user_id}_{session_id}_{index}")),
                );
            }
            obj.entry("sequence").or_insert_with(|| Value::from(index as i64));
        }
    }
}

/// Parsed archive plus the raw JSON it came from.
#[derive(Debug, Clone, Default)]
pub struct ChatArchive {
    users: BTreeMap<String, BTreeMap<String, SessionRecord>>,
    raw: Value,
}

impl ChatArchive {
    /// Lenient: anything that is not an object of objects is skipped with a warning.
    pub fn from_value(raw: Value) -> Self {
        let mut users = BTreeMap::new();

        match &raw {
            Value::Object(map) => {
                for (user_id, sessions) in map {
                    let Some(sessions) = sessions.as_object() else {
                        warn!(%user_id, "skipping user whose sessions are not an object");
                        continue;
                    };
                    let parsed: BTreeMap<String, SessionRecord> = sessions
                        .iter()
                        .map(|(session_id, payload)| {
                            (
                                session_id.clone(),
                                SessionRecord::from_value(user_id, session_id, payload.clone()),
                            )
                        })
                        .collect();
                    users.insert(user_id.clone(), parsed);
                }
            }
            Value::Null => {}
            other => warn!(kind = json_kind(other), "archive is not an object"),
        }

        debug!(users = users.len(), "archive loaded");
        Self { users, raw }
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn users(&self) -> Vec<UserSummary> {
        self.users
            .keys()
            .map(|id| UserSummary { id: id.clone() })
            .collect()
    }

    pub fn session(&self, user_id: &str, session_id: &str) -> Option<&SessionRecord> {
        self.users.get(user_id)?.get(session_id)
    }

    /// Every `(user, session, record)` triple in key order.
    pub fn sessions_iter(&self) -> impl Iterator<Item = (&str, &str, &SessionRecord)> + '_ {
        self.users.iter().flat_map(|(user_id, sessions)| {
            sessions
                .iter()
                .map(move |(session_id, record)| (user_id.as_str(), session_id.as_str(), record))
        })
    }

    pub fn session_count(&self) -> usize {
        self.users.values().map(BTreeMap::len).sum()
    }

    /// `None` for an unknown user.
    pub fn session_summaries(&self, user_id: &str) -> Option<Vec<SessionSummary>> {
        let sessions = self.users.get(user_id)?;
        Some(
            sessions
                .iter()
                .map(|(session_id, record)| {
                    let messages = normalize_history(&record.history, SessionRef::new(user_id, session_id));
                    let time_of = |m: Option<&Message>| {
                        m.and_then(|m| m.timestamp.clone())
                            .unwrap_or_else(|| UNKNOWN_TIME.to_string())
                    };
                    SessionSummary {
                        id: session_id.clone(),
                        message_count: Some(record.raw_len().max(messages.len())),
                        created_at: Some(time_of(messages.first())),
                        last_activity: Some(time_of(messages.last())),
                    }
                })
                .collect(),
        )
    }

    /// Normalized messages of one session; `None` when the session is unknown.
    pub fn messages(&self, user_id: &str, session_id: &str) -> Option<Vec<Message>> {
        let record = self.session(user_id, session_id)?;
        Some(normalize_history(&record.history, SessionRef::new(user_id, session_id)))
    }

    /// Looks a message up by its own id or by the id its feedback is stored under,
    /// trying the session encoded in the id first. Returns the message with that
    /// feedback id.
    pub fn find_message(&self, message_id: &str) -> Option<(Message, String)> {
        let mut parts = message_id.splitn(3, '_');
        if let (Some(user_id), Some(session_id)) = (parts.next(), parts.next()) {
            let found = self
                .messages(user_id, session_id)
                .and_then(|messages| locate(messages, user_id, session_id, message_id));
            if found.is_some() {
                return found;
            }
        }

        self.sessions_iter().find_map(|(user_id, session_id, record)| {
            let messages = normalize_history(&record.history, SessionRef::new(user_id, session_id));
            locate(messages, user_id, session_id, message_id)
        })
    }

    /// Prompt/response pairs across every session.
    pub fn interactions(&self) -> Vec<Interaction> {
        self.sessions_iter()
            .flat_map(|(user_id, session_id, record)| {
                let messages =
                    normalize_history(&record.history, SessionRef::new(user_id, session_id));
                derive_interactions(user_id, session_id, &messages)
            })
            .collect()
    }
}

fn locate(
    messages: Vec<Message>,
    user_id: &str,
    session_id: &str,
    message_id: &str,
) -> Option<(Message, String)> {
    messages.into_iter().enumerate().find_map(|(index, message)| {
        let key = canonical_message_id(&message.id, user_id, session_id, index);
        (message.id == message_id || key == message_id).then_some((message, key))
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
