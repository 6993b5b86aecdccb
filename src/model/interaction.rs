use serde::{Deserialize, Serialize};

use crate::model::message::{Message, Rating};
use crate::normalize::content::display_text;

pub const UNKNOWN_INTERACTION_TIME: &str = "Unknown time";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionUser {
    pub name: String,
    #[serde(default)]
    pub avatar: String,
}

/// A user prompt paired with the assistant reply that directly follows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    pub id: String,
    #[serde(default)]
    pub user_prompt: String,
    #[serde(default)]
    pub ai_response: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub agents: Vec<String>,
    #[serde(default)]
    pub rating: Option<Rating>,
    #[serde(default)]
    pub comments: Vec<String>,
    #[serde(default)]
    pub user: Option<InteractionUser>,
    /// Position of the user message, used as the tie-breaker when sorting.
    #[serde(default, skip_serializing)]
    pub sequence: i64,
}

impl Interaction {
    pub fn user_name(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.name.as_str())
    }
}

/// Pairs every user message with an immediately following assistant message.
///
/// Ids are `<user>_<session>_<index>` where `index` is the position of the user message,
/// so they line up with the message ids feedback is stored under.
pub fn derive_interactions(user_id: &str, session_id: &str, messages: &[Message]) -> Vec<Interaction> {
    messages
        .windows(2)
        .enumerate()
        .filter(|(_, pair)| pair[0].role.is_user() && pair[1].role.is_assistant())
        .map(|(i, pair)| Interaction {
            id: format!("{user_id}_{session_id}_{i}"),
            user_prompt: display_text(&pair[0].content),
            ai_response: display_text(&pair[1].content),
            timestamp: pair[0]
                .timestamp
                .clone()
                .unwrap_or_else(|| UNKNOWN_INTERACTION_TIME.to_string()),
            agents: pair[0].agents.clone(),
            rating: None,
            comments: Vec::new(),
            user: Some(InteractionUser {
                name: user_id.to_string(),
                avatar: String::new(),
            }),
            sequence: i as i64,
        })
        .collect()
}
