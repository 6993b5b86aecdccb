//! Coerces the chat-history shapes found in exports into a flat list of [`Message`]s.
//!
//! Histories arrive in one of four layouts: a flat array of role-tagged messages, the
//! MongoDB numbered-key layout (`[{"0": {..}, "1": {..}}]`), exchange groups
//! (`[{"id": .., "messages": [..]}]`) or anything else, handled item by item. Malformed
//! items become placeholders; nothing here returns an error.

pub mod content;
pub mod role;

use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::model::message::{Message, Rating, Role};
use crate::timestamp::timestamp_text;
use content::{id_text, pick_field, pick_str, string_list, NO_CONTENT};
use role::{exact_role, infer_role};

/// Fields probed, in order, when the session payload is an object.
const HISTORY_KEYS: &[&str] = &["chat_history", "messages", "history", "conversation"];
const FLAT_CONTENT_KEYS: &[&str] = &["content", "text", "message"];
const LOOSE_CONTENT_KEYS: &[&str] = &["content", "text", "message", "value"];
const ROLE_KEYS: &[&str] = &["role", "sender"];
const ID_KEYS: &[&str] = &["id", "message_id"];
/// Exchanges are assumed to hold fewer messages than this.
pub const EXCHANGE_STRIDE: i64 = 1000;
/// Numbered keys above this are not treated as positional.
const MAX_NUMBERED_KEY: u32 = 100_000;

/// Ids used when a message carries none.
#[derive(Debug, Clone, Copy)]
pub struct SessionRef<'a> {
    pub user_id: &'a str,
    pub session_id: &'a str,
}

impl<'a> SessionRef<'a> {
    pub fn new(user_id: &'a str, session_id: &'a str) -> Self {
        Self {
            user_id,
            session_id,
        }
    }

    /// Canonical composite id, `<user>_<session>_<index>`.
    pub fn message_id(&self, index: usize) -> String {
        format!("{}_{}_{}", self.user_id, self.session_id, index)
    }

    fn fallback_id(&self, index: usize) -> String {
        format!("{}_{}_fallback_{}", self.user_id, self.session_id, index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryShape {
    Flat,
    NumberedKeys,
    Exchanges,
    Fallback,
}

/// Message before the post-pass fills ids and sequences.
#[derive(Debug, Default)]
struct Draft {
    id: Option<String>,
    role: Role,
    content: Value,
    timestamp: Option<String>,
    sequence: Option<i64>,
    comments: Vec<String>,
    feedback: Option<Rating>,
    agents: Vec<String>,
}

/// Normalize one session's raw history.
pub fn normalize_history(raw: &Value, session: SessionRef<'_>) -> Vec<Message> {
    let Some(items) = locate_history(raw) else {
        debug!(
            user_id = session.user_id,
            session_id = session.session_id,
            "no history array in session payload"
        );
        return Vec::new();
    };

    let shape = detect_shape(items);
    debug!(
        user_id = session.user_id,
        session_id = session.session_id,
        ?shape,
        items = items.len(),
        "normalizing history"
    );

    let drafts = match shape {
        HistoryShape::Flat => items.iter().map(flat_message).collect(),
        HistoryShape::NumberedKeys => numbered_messages(items),
        HistoryShape::Exchanges => exchange_messages(items),
        HistoryShape::Fallback => items.iter().map(fallback_message).collect(),
    };

    finalize(drafts, session)
}

/// The array holding the history, if the payload has one.
pub fn locate_history(raw: &Value) -> Option<&Vec<Value>> {
    match raw {
        Value::Array(items) => Some(items),
        Value::Object(map) => HISTORY_KEYS
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_array))
            .or_else(|| map.values().find_map(Value::as_array)),
        _ => None,
    }
}

pub fn detect_shape(items: &[Value]) -> HistoryShape {
    let objects: Vec<&Map<String, Value>> = items.iter().filter_map(Value::as_object).collect();
    if objects.is_empty() {
        return HistoryShape::Fallback;
    }

    let all_flat = objects.len() == items.len()
        && objects.iter().all(|obj| {
            obj.get("role")
                .and_then(Value::as_str)
                .and_then(exact_role)
                .is_some()
        });
    if all_flat {
        return HistoryShape::Flat;
    }

    let first = objects[0];
    if !first.is_empty() && first.keys().all(|k| numbered_key(k).is_some()) {
        return HistoryShape::NumberedKeys;
    }
    if first.get("messages").map(Value::is_array).unwrap_or(false) {
        return HistoryShape::Exchanges;
    }
    HistoryShape::Fallback
}

fn numbered_key(key: &str) -> Option<u32> {
    key.parse::<u32>().ok().filter(|n| *n <= MAX_NUMBERED_KEY)
}

fn flat_message(item: &Value) -> Draft {
    let Some(obj) = item.as_object() else {
        return fallback_message(item);
    };

    Draft {
        id: ID_KEYS.iter().find_map(|k| obj.get(*k).and_then(id_text)),
        role: obj
            .get("role")
            .and_then(Value::as_str)
            .and_then(exact_role)
            .unwrap_or(Role::Unknown),
        content: pick_field(obj, FLAT_CONTENT_KEYS)
            .cloned()
            .unwrap_or_else(|| Value::String(String::new())),
        timestamp: obj.get("timestamp").and_then(timestamp_text),
        sequence: obj.get("sequence").and_then(Value::as_i64),
        comments: string_list(obj.get("comments")),
        feedback: feedback_of(obj),
        agents: string_list(obj.get("agents")),
    }
}

fn numbered_messages(entries: &[Value]) -> Vec<Draft> {
    let mut out = Vec::new();
    for (entry_index, entry) in entries.iter().enumerate() {
        let Some(map) = entry.as_object() else {
            warn!(entry_index, "skipping non-object entry in numbered-key history");
            out.push(fallback_message(entry));
            continue;
        };

        let mut keys: Vec<(u32, &String)> = map
            .keys()
            .filter_map(|k| numbered_key(k).map(|n| (n, k)))
            .collect();
        keys.sort_by_key(|(n, _)| *n);

        for (_, key) in keys {
            let mut draft = loose_message(&map[key.as_str()]);
            draft.id = Some(format!("{entry_index}_{key}"));
            out.push(draft);
        }
    }
    out
}

fn exchange_messages(exchanges: &[Value]) -> Vec<Draft> {
    let mut out = Vec::new();
    for (exchange_index, exchange) in exchanges.iter().enumerate() {
        let Some(obj) = exchange.as_object() else {
            out.push(fallback_message(exchange));
            continue;
        };
        let Some(nested) = obj.get("messages").and_then(Value::as_array) else {
            // a stray message between exchanges
            out.push(fallback_message(exchange));
            continue;
        };

        let exchange_id = obj
            .get("id")
            .and_then(id_text)
            .unwrap_or_else(|| exchange_index.to_string());
        let exchange_ts = obj.get("timestamp").and_then(timestamp_text);
        let base = obj
            .get("sequence")
            .and_then(Value::as_i64)
            .unwrap_or(exchange_index as i64);

        for (message_index, message) in nested.iter().enumerate() {
            let mut draft = loose_message(message);
            if draft.id.is_none() {
                draft.id = Some(format!("{exchange_id}_m_{message_index}"));
            }
            if draft.timestamp.is_none() {
                draft.timestamp = exchange_ts.clone();
            }
            draft.sequence = Some(base * EXCHANGE_STRIDE + message_index as i64);
            out.push(draft);
        }
    }
    out
}

fn fallback_message(item: &Value) -> Draft {
    let mut draft = loose_message(item);
    if draft.role == Role::Unknown {
        debug!("message without a recognizable role");
    }
    draft
}

/// Best-effort extraction shared by the numbered, exchange and fallback paths.
fn loose_message(item: &Value) -> Draft {
    match item {
        Value::Object(obj) => Draft {
            id: ID_KEYS.iter().find_map(|k| obj.get(*k).and_then(id_text)),
            role: pick_str(obj, ROLE_KEYS)
                .map(infer_role)
                .unwrap_or(Role::Unknown),
            content: pick_field(obj, LOOSE_CONTENT_KEYS)
                .cloned()
                .unwrap_or_else(|| Value::String(NO_CONTENT.to_string())),
            timestamp: obj.get("timestamp").and_then(timestamp_text),
            sequence: obj.get("sequence").and_then(Value::as_i64),
            comments: string_list(obj.get("comments")),
            feedback: feedback_of(obj),
            agents: string_list(obj.get("agents")),
        },
        Value::String(s) => Draft {
            content: Value::String(s.clone()),
            ..Draft::default()
        },
        Value::Null => Draft {
            content: Value::String(NO_CONTENT.to_string()),
            ..Draft::default()
        },
        other => Draft {
            content: Value::String(other.to_string()),
            ..Draft::default()
        },
    }
}

fn feedback_of(obj: &Map<String, Value>) -> Option<Rating> {
    obj.get("feedback")
        .and_then(Rating::from_value)
        .or_else(|| obj.get("rating").and_then(Rating::from_value))
}

/// Guarantees a unique non-empty id, a comments list and a sequence on every message.
fn finalize(drafts: Vec<Draft>, session: SessionRef<'_>) -> Vec<Message> {
    let mut seen = HashSet::with_capacity(drafts.len());

    drafts
        .into_iter()
        .enumerate()
        .map(|(index, draft)| {
            let mut id = draft
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| session.fallback_id(index));
            if !seen.insert(id.clone()) {
                warn!(
                    duplicate_id = %id,
                    user_id = session.user_id,
                    session_id = session.session_id,
                    "duplicate message id in history"
                );
                id = session.fallback_id(index);
                seen.insert(id.clone());
            }

            Message {
                id,
                role: draft.role,
                content: draft.content,
                timestamp: draft.timestamp,
                sequence: draft.sequence.unwrap_or(index as i64),
                comments: draft.comments,
                feedback: draft.feedback,
                agents: draft.agents,
            }
        })
        .collect()
}
