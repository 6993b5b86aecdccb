//! Filter, sort and paginate over messages and interactions.

pub mod filter;
pub mod paginate;
pub mod sort;

use crate::model::{Interaction, Message, Rating, Role};
use crate::normalize::content::{display_text, function_names, function_responses};

pub use filter::{FeedbackFilter, SearchField, ViewFilter};
pub use paginate::{paginate, Page, INTERACTIONS_PAGE_SIZE};
pub use sort::{sort_records, SortDirection, SortKey, SortSpec};

/// What the view layer needs to know about a listed record.
pub trait ViewRecord {
    fn record_id(&self) -> &str;

    /// `None` for records without a role (interactions), which pass role filters.
    fn role(&self) -> Option<Role>;

    fn rating(&self) -> Option<Rating>;

    fn comments(&self) -> &[String];

    fn timestamp(&self) -> Option<&str>;

    fn sequence(&self) -> i64;

    fn user_id(&self) -> Option<&str>;

    /// Session id encoded in a composite `<user>_<session>_<n>` id.
    fn session_id(&self) -> Option<&str> {
        self.record_id().split('_').nth(1)
    }

    /// Text searched and sorted on for `field`.
    fn field_text(&self, field: SearchField) -> String;
}

impl ViewRecord for Message {
    fn record_id(&self) -> &str {
        &self.id
    }

    fn role(&self) -> Option<Role> {
        Some(self.role)
    }

    fn rating(&self) -> Option<Rating> {
        self.feedback
    }

    fn comments(&self) -> &[String] {
        &self.comments
    }

    fn timestamp(&self) -> Option<&str> {
        self.timestamp.as_deref()
    }

    fn sequence(&self) -> i64 {
        self.sequence
    }

    fn user_id(&self) -> Option<&str> {
        self.user_segment()
    }

    fn field_text(&self, field: SearchField) -> String {
        let text = display_text(&self.content);
        match field {
            SearchField::Message => text,
            SearchField::Response if self.role.is_assistant() => text,
            SearchField::Response => String::new(),
            SearchField::FunctionName => named_functions(&self.agents, &text),
            SearchField::FunctionResponse => function_responses(&text).join("\n"),
            SearchField::Comment => self.comments.join("\n"),
            SearchField::UserId => self.user_segment().unwrap_or_default().to_string(),
            SearchField::MessageId => self.id.clone(),
            SearchField::Timestamp => self.timestamp.clone().unwrap_or_default(),
        }
    }
}

impl ViewRecord for Interaction {
    fn record_id(&self) -> &str {
        &self.id
    }

    fn role(&self) -> Option<Role> {
        None
    }

    fn rating(&self) -> Option<Rating> {
        self.rating
    }

    fn comments(&self) -> &[String] {
        &self.comments
    }

    fn timestamp(&self) -> Option<&str> {
        Some(self.timestamp.as_str())
    }

    fn sequence(&self) -> i64 {
        self.sequence
    }

    fn user_id(&self) -> Option<&str> {
        self.user_name()
    }

    fn field_text(&self, field: SearchField) -> String {
        match field {
            SearchField::Message => self.user_prompt.clone(),
            SearchField::Response => self.ai_response.clone(),
            SearchField::FunctionName => named_functions(&self.agents, &self.ai_response),
            SearchField::FunctionResponse => function_responses(&self.ai_response).join("\n"),
            SearchField::Comment => self.comments.join("\n"),
            SearchField::UserId => self.user_name().unwrap_or_default().to_string(),
            SearchField::MessageId => self.id.clone(),
            SearchField::Timestamp => self.timestamp.clone(),
        }
    }
}

/// Recorded agents first, then function names mentioned in `text`.
fn named_functions(agents: &[String], text: &str) -> String {
    let mut names = agents.to_vec();
    for name in function_names(text) {
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names.join(" ")
}

/// Filter, then sort, then cut one page.
pub fn derive_view<R: ViewRecord + Clone>(
    items: &[R],
    filter: &ViewFilter,
    sort: &SortSpec,
    page: usize,
    page_size: usize,
) -> Page<R> {
    let mut filtered = filter.apply(items);
    sort_records(&mut filtered, sort);
    paginate(filtered, page, page_size)
}
