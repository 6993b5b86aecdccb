use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{ClientError, ReviewClient};
use crate::config::{clamp_poll, ClientConfig};
use crate::model::{Message, Rating};

pub use crate::model::canonical_message_id;
use crate::view::{sort_records, SortSpec, ViewFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// Transient notification for the reviewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    fn success(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            text: text.into(),
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }
}

/// Client-side state of one open session.
#[derive(Debug, Clone, Default)]
pub struct SessionView {
    pub user_id: String,
    pub session_id: String,
    pub messages: Vec<Message>,
    pub projects: Vec<Value>,
    pub tasks: Vec<Value>,
    pub loading: bool,
    /// Inline error shown with a retry action; cleared by the next successful load.
    pub error: Option<String>,
    pub notices: Vec<Notice>,
    pub filter: ViewFilter,
    pub sort: SortSpec,
}

/// Replaces empty or repeated ids so that every message can be addressed.
pub fn repair_ids(messages: &mut [Message], user_id: &str, session_id: &str) {
    let mut seen = HashSet::with_capacity(messages.len());
    for (index, message) in messages.iter_mut().enumerate() {
        if message.id.trim().is_empty() || seen.contains(&message.id) {
            message.id = format!("{user_id}_{session_id}_fallback_{index}");
        }
        seen.insert(message.id.clone());
    }
}

/// Drives one session: loading, feedback writes with reconciliation, and polling.
///
/// Writes update local state only after the server accepted them. A successful
/// single-message re-fetch then replaces the local value; a failed one keeps it.
#[derive(Clone)]
pub struct SessionController {
    client: ReviewClient,
    config: ClientConfig,
    view: Arc<Mutex<SessionView>>,
}

impl SessionController {
    pub fn new(client: ReviewClient, config: ClientConfig, user_id: &str, session_id: &str) -> Self {
        Self {
            client,
            config,
            view: Arc::new(Mutex::new(SessionView {
                user_id: user_id.to_string(),
                session_id: session_id.to_string(),
                ..SessionView::default()
            })),
        }
    }

    async fn ids(&self) -> (String, String) {
        let view = self.view.lock().await;
        (view.user_id.clone(), view.session_id.clone())
    }

    async fn notify(&self, notice: Notice) {
        self.view.lock().await.notices.push(notice);
    }

    /// Fetches the whole session. On failure the previous messages stay and `error` is set.
    pub async fn load(&self) -> Result<(), ClientError> {
        let (user_id, session_id) = self.ids().await;
        self.view.lock().await.loading = true;

        let result = self.client.session_chat(&user_id, &session_id).await;

        let mut view = self.view.lock().await;
        view.loading = false;
        match result {
            Ok(chat) => {
                let mut messages = chat.messages;
                repair_ids(&mut messages, &user_id, &session_id);
                debug!(%user_id, %session_id, count = messages.len(), "session loaded");
                view.messages = messages;
                view.projects = chat.projects;
                view.tasks = chat.tasks;
                view.error = None;
                Ok(())
            }
            Err(e) => {
                error!(%user_id, %session_id, error = %e, "failed to load session");
                view.error = Some(e.to_string());
                view.notices.push(Notice::error(format!("Failed to load session: {e}")));
                Err(e)
            }
        }
    }

    pub async fn refresh(&self) -> Result<(), ClientError> {
        self.load().await
    }

    /// `(canonical id, message)` for the message at `index`.
    async fn target(&self, index: usize) -> Result<(String, Message), ClientError> {
        let view = self.view.lock().await;
        let message = view
            .messages
            .get(index)
            .cloned()
            .ok_or(ClientError::NoMessage(index))?;
        let id = canonical_message_id(&message.id, &view.user_id, &view.session_id, index);
        Ok((id, message))
    }

    /// Applies `update` to the local message stored under `id` (or at `index`).
    async fn update_local(&self, id: &str, index: usize, update: impl FnOnce(&mut Message)) {
        let mut view = self.view.lock().await;
        let position = view
            .messages
            .iter()
            .position(|m| m.id == id)
            .or_else(|| (index < view.messages.len()).then_some(index));
        if let Some(message) = position.and_then(|p| view.messages.get_mut(p)) {
            update(message);
        }
    }

    /// Adopts the server's comments and rating when the re-fetch succeeds.
    async fn reconcile(&self, id: &str, index: usize) {
        match self.client.message(id).await {
            Ok(server) => {
                self.update_local(id, index, |m| {
                    m.comments = server.comments;
                    m.feedback = server.feedback;
                })
                .await;
            }
            Err(e) => warn!(message_id = id, error = %e, "re-fetch failed, keeping local state"),
        }
    }

    pub async fn add_comment(&self, index: usize, text: &str) -> Result<(), ClientError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        let (id, _) = self.target(index).await?;

        if let Err(e) = self.client.add_comment(&id, text).await {
            error!(message_id = %id, error = %e, "failed to save comment");
            self.notify(Notice::error(format!("Failed to save comment: {e}"))).await;
            return Err(e);
        }

        let comment = text.to_string();
        self.update_local(&id, index, |m| m.comments.push(comment)).await;
        self.reconcile(&id, index).await;
        self.notify(Notice::success("Comment added")).await;
        info!(message_id = %id, "comment added");

        self.schedule_refresh();
        Ok(())
    }

    /// Clicking the current rating again clears it.
    pub async fn set_feedback(&self, index: usize, rating: Rating) -> Result<(), ClientError> {
        let (id, message) = self.target(index).await?;
        let next = Rating::toggle(message.feedback, Some(rating));

        if let Err(e) = self.client.set_rating(&id, next).await {
            error!(message_id = %id, error = %e, "failed to save rating");
            self.notify(Notice::error(format!("Failed to save rating: {e}"))).await;
            return Err(e);
        }

        self.update_local(&id, index, |m| m.feedback = next).await;
        self.reconcile(&id, index).await;
        let text = match next {
            Some(r) => format!("Marked as {}", r.as_str()),
            None => "Rating cleared".to_string(),
        };
        self.notify(Notice::success(text)).await;
        Ok(())
    }

    fn schedule_refresh(&self) {
        let controller = self.clone();
        let delay = self.config.refresh_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = controller.refresh().await {
                debug!(error = %e, "delayed refresh failed");
            }
        });
    }

    /// Filtered and sorted messages for display.
    pub async fn visible_messages(&self) -> Vec<Message> {
        let view = self.view.lock().await;
        let mut visible = view.filter.apply(&view.messages);
        sort_records(&mut visible, &view.sort);
        visible
    }

    pub async fn set_filter(&self, filter: ViewFilter) {
        self.view.lock().await.filter = filter;
    }

    pub async fn set_sort(&self, sort: SortSpec) {
        self.view.lock().await.sort = sort;
    }

    pub async fn set_messages(&self, mut messages: Vec<Message>) {
        let mut view = self.view.lock().await;
        repair_ids(&mut messages, &view.user_id, &view.session_id);
        view.messages = messages;
    }

    pub async fn snapshot(&self) -> SessionView {
        self.view.lock().await.clone()
    }

    pub async fn take_notices(&self) -> Vec<Notice> {
        std::mem::take(&mut self.view.lock().await.notices)
    }

    /// Starts re-fetching the session on an interval, unless auto-refresh is off.
    pub fn start_polling(&self) -> Option<PollHandle> {
        if !self.config.auto_refresh {
            return None;
        }
        let period = clamp_poll(self.config.poll_interval);
        let controller = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // the first tick fires immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = controller.refresh().await {
                    debug!(error = %e, "poll refresh failed");
                }
            }
        });
        info!(interval = ?period, "session polling started");
        Some(PollHandle { handle })
    }
}

/// Stops the polling task when dropped.
pub struct PollHandle {
    handle: JoinHandle<()>,
}

impl PollHandle {
    pub fn stop(self) {
        self.handle.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
