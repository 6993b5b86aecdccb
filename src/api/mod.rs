use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub mod error;
pub mod handlers;
pub mod types;

use handlers::{
    chat_histories, comment_activity, export_archive, get_message, interactions_over_time,
    list_interactions, list_sessions, list_users, overall_stats, post_comment,
    rating_distribution, root, session_chat, user_ratios,
};

/// Review API. CORS and tracing layers are added by the caller.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        // archive browsing
        .route("/api/users", get(list_users))
        .route("/api/users/{user_id}/sessions", get(list_sessions))
        .route(
            "/api/users/{user_id}/sessions/{session_id}",
            get(session_chat),
        )
        .route("/api/message/{message_id}", get(get_message))
        .route("/api/chat_histories", get(chat_histories))
        .route("/api/interactions", get(list_interactions))
        // feedback writes
        .route("/api/comments", post(post_comment))
        // dashboard
        .route("/api/stats", get(overall_stats))
        .route("/api/ratings", get(rating_distribution))
        .route("/api/interactions-over-time", get(interactions_over_time))
        .route("/api/comment-activity", get(comment_activity))
        .route("/api/user-ratios", get(user_ratios))
        .route("/api/export", post(export_archive))
}
