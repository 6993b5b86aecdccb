//! Typed HTTP access to the review API, plus the per-session controller used by
//! review front-ends.

pub mod session;

use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::api::types::{CommentBody, SessionChat, SuccessResponse};
use crate::export::{ExportFormat, ExportedFile};
use crate::model::{Interaction, Message, Rating, SessionSummary, UserSummary};
use crate::stats::{Bucket, OverallStats, Period, RatingCounts, UserRatio};

pub use session::{Notice, NoticeLevel, PollHandle, SessionController, SessionView};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx answer; `message` is the server's `error` field when it sent one.
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("no message at index {0}")]
    NoMessage(usize),

    #[error("invalid API url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Status { status: 404, .. })
    }
}

#[derive(Clone)]
pub struct ReviewClient {
    client: Client,
    base_url: String,
}

impl ReviewClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Base url extended by `segments`, each percent-encoded as one path segment.
    fn url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let invalid = |reason: String| ClientError::InvalidUrl {
            url: self.base_url.clone(),
            reason,
        };
        let mut url = Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid("cannot be a base".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn read<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
                .unwrap_or(text);
            return Err(ClientError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json().await?)
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ClientError> {
        let response = self.client.get(self.url(segments)?).send().await?;
        Self::read(response).await
    }

    async fn get_with_period<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        period: Period,
    ) -> Result<T, ClientError> {
        let response = self
            .client
            .get(self.url(segments)?)
            .query(&[("period", period.as_str())])
            .send()
            .await?;
        Self::read(response).await
    }

    pub async fn users(&self) -> Result<Vec<UserSummary>, ClientError> {
        self.get(&["api", "users"]).await
    }

    pub async fn sessions(&self, user_id: &str) -> Result<Vec<SessionSummary>, ClientError> {
        self.get(&["api", "users", user_id, "sessions"]).await
    }

    pub async fn session_chat(&self, user_id: &str, session_id: &str) -> Result<SessionChat, ClientError> {
        self.get(&["api", "users", user_id, "sessions", session_id])
            .await
    }

    pub async fn message(&self, message_id: &str) -> Result<Message, ClientError> {
        self.get(&["api", "message", message_id]).await
    }

    pub async fn submit(&self, body: &CommentBody) -> Result<(), ClientError> {
        let response = self
            .client
            .post(self.url(&["api", "comments"])?)
            .json(body)
            .send()
            .await?;
        let _: SuccessResponse = Self::read(response).await?;
        Ok(())
    }

    pub async fn add_comment(&self, message_id: &str, comment: &str) -> Result<(), ClientError> {
        self.submit(&CommentBody {
            message_id: message_id.to_string(),
            comment: Some(comment.to_string()),
            rating: None,
        })
        .await
    }

    /// `None` clears the rating.
    pub async fn set_rating(&self, message_id: &str, rating: Option<Rating>) -> Result<(), ClientError> {
        self.submit(&CommentBody {
            message_id: message_id.to_string(),
            comment: None,
            rating: Some(rating),
        })
        .await
    }

    /// Raw interactions as served; items keep whatever fields the source produced.
    pub async fn raw_interactions(&self) -> Result<Vec<Value>, ClientError> {
        self.get(&["api", "interactions"]).await
    }

    /// Interactions that parse as [`Interaction`]; others are dropped.
    pub async fn interactions(&self) -> Result<Vec<Interaction>, ClientError> {
        Ok(self
            .raw_interactions()
            .await?
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect())
    }

    pub async fn stats(&self) -> Result<OverallStats, ClientError> {
        self.get(&["api", "stats"]).await
    }

    pub async fn ratings(&self) -> Result<RatingCounts, ClientError> {
        self.get(&["api", "ratings"]).await
    }

    pub async fn interactions_over_time(&self, period: Period) -> Result<Vec<Bucket>, ClientError> {
        self.get_with_period(&["api", "interactions-over-time"], period)
            .await
    }

    pub async fn comment_activity(&self, period: Period) -> Result<Vec<Bucket>, ClientError> {
        self.get_with_period(&["api", "comment-activity"], period)
            .await
    }

    pub async fn user_ratios(&self) -> Result<Vec<UserRatio>, ClientError> {
        self.get(&["api", "user-ratios"]).await
    }

    pub async fn chat_histories(&self) -> Result<Value, ClientError> {
        self.get(&["api", "chat_histories"]).await
    }

    pub async fn export(&self, format: ExportFormat) -> Result<ExportedFile, ClientError> {
        let format = match format {
            ExportFormat::Nested => "nested",
            ExportFormat::Flat => "flat",
        };
        let response = self
            .client
            .post(self.url(&["api", "export"])?)
            .query(&[("format", format)])
            .send()
            .await?;
        Self::read(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_encoded_as_single_segments() {
        let client = ReviewClient::new("http://127.0.0.1:3002/");
        let url = client.url(&["api", "message", "a/b?c#d"]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:3002/api/message/a%2Fb%3Fc%23d");

        let nested = ReviewClient::new("http://host/review");
        let url = nested.url(&["api", "users", "ann lee", "sessions"]).unwrap();
        assert_eq!(url.as_str(), "http://host/review/api/users/ann%20lee/sessions");
    }

    #[test]
    fn bad_base_url_is_reported() {
        let client = ReviewClient::new("not a url");
        assert!(matches!(
            client.url(&["api", "users"]),
            Err(ClientError::InvalidUrl { .. })
        ));
    }
}
