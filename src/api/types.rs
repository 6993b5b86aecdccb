use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::api::error::ApiError;
use crate::model::{FeedbackUpdate, Message, Rating};

/// Session payload: normalized messages with stored feedback merged in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionChat {
    pub messages: Vec<Message>,
    #[serde(default)]
    pub projects: Vec<Value>,
    #[serde(default)]
    pub tasks: Vec<Value>,
    #[serde(default)]
    pub email_thread_chain: Vec<Value>,
    #[serde(default)]
    pub email_thread_id: Option<Value>,
}

/// Accepted id field names, preferred first.
const MESSAGE_ID_FIELDS: &[&str] = &["message_id", "messageId", "interactionId"];

/// Body of `POST /api/comments`.
///
/// Parsed from raw JSON so that an explicit `"rating": null` (clear) is told apart from
/// a missing rating (keep).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRequest {
    pub message_id: String,
    pub update: FeedbackUpdate,
}

impl CommentRequest {
    pub fn from_json(body: &Value) -> Result<Self, ApiError> {
        let obj = body
            .as_object()
            .ok_or_else(|| ApiError::BadRequest("request body must be a JSON object".into()))?;

        let message_id = MESSAGE_ID_FIELDS
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_str))
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ApiError::BadRequest("message_id required".into()))?
            .to_string();

        Ok(Self {
            message_id,
            update: FeedbackUpdate {
                comment: comment_field(obj)?,
                rating: rating_field(obj)?,
            },
        })
    }
}

fn comment_field(obj: &Map<String, Value>) -> Result<Option<String>, ApiError> {
    match obj.get("comment") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ApiError::BadRequest("Comment must be a string".into())),
    }
}

/// `neutral` and `null` clear the rating.
fn rating_field(obj: &Map<String, Value>) -> Result<Option<Option<Rating>>, ApiError> {
    match obj.get("rating") {
        None => Ok(None),
        Some(Value::Null) => Ok(Some(None)),
        Some(Value::String(s)) if s.eq_ignore_ascii_case("neutral") => Ok(Some(None)),
        Some(Value::String(s)) => s
            .parse::<Rating>()
            .map(|r| Some(Some(r)))
            .map_err(|_| ApiError::BadRequest("Invalid rating value".into())),
        Some(_) => Err(ApiError::BadRequest("Invalid rating value".into())),
    }
}

/// Outgoing body of `POST /api/comments`, as sent by the client.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CommentBody {
    pub message_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Serialized even when `Some(None)` so the server clears the rating.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<Option<Rating>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct PeriodQuery {
    pub period: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
}
