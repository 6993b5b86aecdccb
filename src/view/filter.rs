use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::{Rating, Role};
use crate::timestamp::parse_timestamp;
use crate::view::ViewRecord;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackFilter {
    #[default]
    All,
    Good,
    Bad,
    /// Records without a rating.
    None,
}

impl FeedbackFilter {
    fn accepts(&self, rating: Option<Rating>) -> bool {
        match self {
            FeedbackFilter::All => true,
            FeedbackFilter::Good => rating == Some(Rating::Good),
            FeedbackFilter::Bad => rating == Some(Rating::Bad),
            FeedbackFilter::None => rating.is_none(),
        }
    }
}

impl FromStr for FeedbackFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Ok(FeedbackFilter::All),
            "good" => Ok(FeedbackFilter::Good),
            "bad" => Ok(FeedbackFilter::Bad),
            "none" | "unrated" | "neutral" => Ok(FeedbackFilter::None),
            other => Err(format!("unknown feedback filter: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchField {
    #[default]
    Message,
    Response,
    FunctionName,
    FunctionResponse,
    Comment,
    UserId,
    MessageId,
    Timestamp,
}

impl FromStr for SearchField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-' && *c != ' ')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "message" | "prompt" => Ok(SearchField::Message),
            "response" => Ok(SearchField::Response),
            "functionname" | "function" => Ok(SearchField::FunctionName),
            "functionresponse" => Ok(SearchField::FunctionResponse),
            "comment" | "comments" => Ok(SearchField::Comment),
            "userid" | "user" => Ok(SearchField::UserId),
            "messageid" | "id" => Ok(SearchField::MessageId),
            "timestamp" => Ok(SearchField::Timestamp),
            _ => Err(format!("unknown search field: {s}")),
        }
    }
}

/// AND-combined predicates over a list of records. Every unset predicate passes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewFilter {
    pub role: Option<Role>,
    /// Drops system messages unless `role` asks for them.
    pub hide_system: bool,
    pub session_id: Option<String>,
    pub feedback: FeedbackFilter,
    pub search: Option<String>,
    pub search_field: SearchField,
    pub comment_count: Option<usize>,
    pub has_comments: Option<bool>,
    pub user: Option<String>,
    pub date: Option<NaiveDate>,
}

impl ViewFilter {
    pub fn matches<R: ViewRecord + ?Sized>(&self, record: &R) -> bool {
        let role = record.role();

        if let (Some(wanted), Some(actual)) = (self.role, role) {
            if wanted != actual {
                return false;
            }
        }
        if self.hide_system && role == Some(Role::System) && self.role != Some(Role::System) {
            return false;
        }
        if let Some(session) = non_empty(&self.session_id) {
            if record.session_id() != Some(session) {
                return false;
            }
        }
        if !self.feedback.accepts(record.rating()) {
            return false;
        }
        if let Some(needle) = non_empty(&self.search) {
            let haystack = record.field_text(self.search_field).to_lowercase();
            if !haystack.contains(&needle.to_lowercase()) {
                return false;
            }
        }
        let comment_count = record.comments().len();
        if let Some(count) = self.comment_count {
            if comment_count != count {
                return false;
            }
        }
        if let Some(has) = self.has_comments {
            if (comment_count > 0) != has {
                return false;
            }
        }
        if let Some(user) = non_empty(&self.user) {
            if record.user_id() != Some(user) {
                return false;
            }
        }
        if let Some(day) = self.date {
            let record_day = record
                .timestamp()
                .and_then(parse_timestamp)
                .map(|dt| dt.date_naive());
            if record_day != Some(day) {
                return false;
            }
        }
        true
    }

    pub fn apply<R: ViewRecord + Clone>(&self, items: &[R]) -> Vec<R> {
        items.iter().filter(|r| self.matches(*r)).cloned().collect()
    }

    /// Number of predicates currently narrowing the list.
    pub fn active_filter_count(&self) -> usize {
        [
            self.role.is_some(),
            self.hide_system,
            non_empty(&self.session_id).is_some(),
            self.feedback != FeedbackFilter::All,
            non_empty(&self.search).is_some(),
            self.comment_count.is_some(),
            self.has_comments.is_some(),
            non_empty(&self.user).is_some(),
            self.date.is_some(),
        ]
        .iter()
        .filter(|on| **on)
        .count()
    }

    pub fn reset(&mut self) {
        *self = ViewFilter::default();
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Interaction, InteractionUser, Message};
    use serde_json::json;

    fn message(id: &str, role: Role, text: &str) -> Message {
        Message {
            id: id.to_string(),
            role,
            content: json!(text),
            timestamp: Some("2024-03-01T10:00:00Z".into()),
            sequence: 0,
            comments: Vec::new(),
            feedback: None,
            agents: Vec::new(),
        }
    }

    fn interaction(id: &str, user: &str, response: &str) -> Interaction {
        Interaction {
            id: id.to_string(),
            user_prompt: "Please email the team".into(),
            ai_response: response.to_string(),
            timestamp: "Unknown time".into(),
            agents: vec!["mail_agent".into()],
            rating: Some(Rating::Bad),
            comments: vec!["wrong recipient".into()],
            user: Some(InteractionUser {
                name: user.to_string(),
                avatar: String::new(),
            }),
            sequence: 0,
        }
    }

    #[test]
    fn session_filter_uses_second_segment() {
        let filter = ViewFilter {
            session_id: Some("s2".into()),
            ..ViewFilter::default()
        };
        assert!(filter.matches(&message("alice_s2_3", Role::User, "x")));
        assert!(!filter.matches(&message("alice_s1_3", Role::User, "x")));
        assert!(!filter.matches(&message("nounderscore", Role::User, "x")));
    }

    #[test]
    fn role_filter_passes_interactions() {
        let filter = ViewFilter {
            role: Some(Role::Assistant),
            ..ViewFilter::default()
        };
        assert!(filter.matches(&interaction("bob_s_0", "bob", "ok")));
        assert!(!filter.matches(&message("bob_s_0", Role::User, "ok")));
    }

    #[test]
    fn hide_system_respects_explicit_role() {
        let system = message("a_s_0", Role::System, "setup");
        let mut filter = ViewFilter {
            hide_system: true,
            ..ViewFilter::default()
        };
        assert!(!filter.matches(&system));
        filter.role = Some(Role::System);
        assert!(filter.matches(&system));
    }

    #[test]
    fn search_is_case_insensitive_per_field() {
        let item = interaction(
            "bob_s_0",
            "bob",
            "Done. function_response: status: SENT\nfunction send_email executed",
        );
        let mut filter = ViewFilter {
            search: Some("send_EMAIL".into()),
            search_field: SearchField::FunctionName,
            ..ViewFilter::default()
        };
        assert!(filter.matches(&item));

        filter.search_field = SearchField::Message;
        assert!(!filter.matches(&item));

        filter.search = Some("sent".into());
        filter.search_field = SearchField::FunctionResponse;
        assert!(filter.matches(&item));

        filter.search = Some("RECIPIENT".into());
        filter.search_field = SearchField::Comment;
        assert!(filter.matches(&item));
    }

    #[test]
    fn comment_and_user_predicates() {
        let item = interaction("bob_s_0", "bob", "ok");
        let filter = ViewFilter {
            comment_count: Some(1),
            has_comments: Some(true),
            user: Some("bob".into()),
            feedback: FeedbackFilter::Bad,
            ..ViewFilter::default()
        };
        assert!(filter.matches(&item));
        assert_eq!(filter.active_filter_count(), 4);

        let other_user = ViewFilter {
            user: Some("carol".into()),
            ..ViewFilter::default()
        };
        assert!(!other_user.matches(&item));
    }

    #[test]
    fn date_filter_skips_unparseable() {
        let filter = ViewFilter {
            date: NaiveDate::from_ymd_opt(2024, 3, 1),
            ..ViewFilter::default()
        };
        assert!(filter.matches(&message("a_s_0", Role::User, "x")));
        // "Unknown time" never matches a date
        assert!(!filter.matches(&interaction("a_s_0", "a", "x")));
    }

    #[test]
    fn reset_clears_everything() {
        let mut filter = ViewFilter {
            role: Some(Role::User),
            search: Some("  ".into()),
            feedback: FeedbackFilter::Good,
            ..ViewFilter::default()
        };
        // blank search text is not an active filter
        assert_eq!(filter.active_filter_count(), 2);
        filter.reset();
        assert_eq!(filter, ViewFilter::default());
        assert_eq!(filter.active_filter_count(), 0);
    }

    #[test]
    fn parses_filter_words() {
        assert_eq!("none".parse::<FeedbackFilter>(), Ok(FeedbackFilter::None));
        assert_eq!("".parse::<FeedbackFilter>(), Ok(FeedbackFilter::All));
        assert!("maybe".parse::<FeedbackFilter>().is_err());
        assert_eq!("functionName".parse::<SearchField>(), Ok(SearchField::FunctionName));
        assert_eq!("user_id".parse::<SearchField>(), Ok(SearchField::UserId));
    }
}
