use serde::{Deserialize, Serialize};

use crate::model::message::Rating;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentEntry {
    pub text: String,
    pub ts: i64,
}

/// Stored review state for one message id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub message_id: String,
    #[serde(default)]
    pub feedback: Option<Rating>,
    #[serde(default)]
    pub comments: Vec<CommentEntry>,
    #[serde(default)]
    pub updated_ts: i64,
}

impl FeedbackRecord {
    pub fn empty(message_id: &str) -> Self {
        Self {
            message_id: message_id.to_string(),
            feedback: None,
            comments: Vec::new(),
            updated_ts: 0,
        }
    }

    pub fn comment_texts(&self) -> Vec<String> {
        self.comments.iter().map(|c| c.text.clone()).collect()
    }
}

/// One write against the feedback store.
///
/// `rating` distinguishes "not sent" (`None`) from "clear" (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedbackUpdate {
    pub comment: Option<String>,
    pub rating: Option<Option<Rating>>,
}
