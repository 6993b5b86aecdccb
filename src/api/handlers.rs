use axum::extract::{Json, Path, Query, State};
use serde_json::Value;
use tracing::{debug, info};

use crate::api::error::{ApiError, ApiResult};
use crate::api::types::{CommentRequest, ExportQuery, PeriodQuery, SessionChat, SuccessResponse};
use crate::catalog::ChatArchive;
use crate::db::DBLayer;
use crate::export::{ExportFormat, ExportedFile};
use crate::model::{
    canonical_message_id, FeedbackRecord, Interaction, Message, SessionSummary, UserSummary,
};
use crate::state::AppState;
use crate::stats::{self, Bucket, OverallStats, Period, RatingCounts, UserRatio};

pub async fn root() -> &'static str {
    "Feedback review API is running."
}

/// A record only overrides archive values once something was written to it.
fn written(record: &FeedbackRecord) -> bool {
    record.updated_ts > 0 || record.feedback.is_some() || !record.comments.is_empty()
}

fn merge_feedback(message: &mut Message, record: Option<&FeedbackRecord>) {
    if let Some(record) = record.filter(|r| written(r)) {
        message.feedback = record.feedback;
        message.comments = record.comment_texts();
    }
}

async fn overlay_feedback(db: &DBLayer, mut interactions: Vec<Interaction>) -> ApiResult<Vec<Interaction>> {
    let ids: Vec<String> = interactions.iter().map(|i| i.id.clone()).collect();
    let records = db.load_many(&ids).await?;
    for interaction in &mut interactions {
        if let Some(record) = records.get(&interaction.id).filter(|r| written(r)) {
            interaction.rating = record.feedback;
            interaction.comments = record.comment_texts();
        }
    }
    Ok(interactions)
}

/// Interactions with stored feedback applied, from whichever source is configured.
async fn load_interactions(state: &AppState) -> ApiResult<(ChatArchive, Vec<Interaction>)> {
    let archive = state.source.load().await?;
    let interactions = match state.source.script_interactions().await? {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<Interaction>(item) {
                Ok(interaction) => Some(interaction),
                Err(e) => {
                    debug!(error = %e, "skipping malformed interaction");
                    None
                }
            })
            .collect(),
        _ => archive.interactions(),
    };
    let interactions = overlay_feedback(&state.db, interactions).await?;
    Ok((archive, interactions))
}

fn parse_period(query: &PeriodQuery) -> ApiResult<Period> {
    match query.period.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        None => Ok(Period::default()),
        Some(raw) => raw.parse().map_err(ApiError::BadRequest),
    }
}

pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Vec<UserSummary>>> {
    let archive = state.source.load().await?;
    Ok(Json(archive.users()))
}

pub async fn list_sessions(
    Path(user_id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<SessionSummary>>> {
    let archive = state.source.load().await?;
    let sessions = archive.session_summaries(&user_id).unwrap_or_else(|| {
        debug!(%user_id, "unknown user");
        Vec::new()
    });
    Ok(Json(sessions))
}

pub async fn session_chat(
    Path((user_id, session_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> ApiResult<Json<SessionChat>> {
    let archive = state.source.load().await?;
    let Some(record) = archive.session(&user_id, &session_id) else {
        debug!(%user_id, %session_id, "unknown session");
        return Ok(Json(SessionChat::default()));
    };
    let mut messages = archive.messages(&user_id, &session_id).unwrap_or_default();

    // feedback lives under the canonical id; records under a plain archive id are
    // still honoured when nothing was written to the canonical one
    let keys: Vec<String> = messages
        .iter()
        .enumerate()
        .map(|(index, m)| canonical_message_id(&m.id, &user_id, &session_id, index))
        .collect();
    state.db.ensure_records(&keys).await?;

    let mut lookup = keys.clone();
    lookup.extend(
        messages
            .iter()
            .zip(&keys)
            .filter(|(m, key)| m.id != **key)
            .map(|(m, _)| m.id.clone()),
    );
    let feedback = state.db.load_many(&lookup).await?;
    for (message, key) in messages.iter_mut().zip(&keys) {
        let record = feedback
            .get(key)
            .filter(|r| written(r))
            .or_else(|| feedback.get(&message.id));
        merge_feedback(message, record);
    }

    Ok(Json(SessionChat {
        messages,
        projects: record.projects.clone(),
        tasks: record.tasks.clone(),
        email_thread_chain: record.email_thread_chain.clone(),
        email_thread_id: record.email_thread_id.clone(),
    }))
}

pub async fn get_message(
    Path(message_id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<Json<Message>> {
    let archive = state.source.load().await?;
    let found = archive.find_message(&message_id);
    let key = found
        .as_ref()
        .map(|(_, key)| key.clone())
        .unwrap_or_else(|| message_id.clone());

    let mut record = state.db.load_feedback(&key).await?;
    if key != message_id && !record.as_ref().is_some_and(written) {
        if let Some(own) = state.db.load_feedback(&message_id).await? {
            record = Some(own);
        }
    }

    let message = match (found, record) {
        (Some((mut message, _)), record) => {
            merge_feedback(&mut message, record.as_ref());
            message
        }
        (None, Some(record)) => Message {
            id: message_id,
            role: Default::default(),
            content: Value::String(String::new()),
            timestamp: None,
            sequence: 0,
            comments: record.comment_texts(),
            feedback: record.feedback,
            agents: Vec::new(),
        },
        (None, None) => {
            return Err(ApiError::NotFound(format!("message {message_id} not found")));
        }
    };
    Ok(Json(message))
}

pub async fn post_comment(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<SuccessResponse>> {
    let req = CommentRequest::from_json(&body)?;
    state.db.apply_update(&req.message_id, &req.update).await?;
    info!(
        message_id = %req.message_id,
        commented = req.update.comment.is_some(),
        rated = req.update.rating.is_some(),
        "feedback stored"
    );
    Ok(Json(SuccessResponse { success: true }))
}

pub async fn list_interactions(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    if let Some(raw) = state.source.script_interactions().await? {
        return Ok(Json(raw));
    }
    let archive = state.source.load().await?;
    let interactions = overlay_feedback(&state.db, archive.interactions()).await?;
    debug!(count = interactions.len(), "returning derived interactions");
    let body = serde_json::to_value(interactions).map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(body))
}

pub async fn overall_stats(State(state): State<AppState>) -> ApiResult<Json<OverallStats>> {
    let (archive, interactions) = load_interactions(&state).await?;
    Ok(Json(stats::overall(&archive, &interactions)))
}

pub async fn rating_distribution(State(state): State<AppState>) -> ApiResult<Json<RatingCounts>> {
    let (_, interactions) = load_interactions(&state).await?;
    Ok(Json(stats::ratings(&interactions)))
}

pub async fn interactions_over_time(
    State(state): State<AppState>,
    Query(query): Query<PeriodQuery>,
) -> ApiResult<Json<Vec<Bucket>>> {
    let period = parse_period(&query)?;
    let (_, interactions) = load_interactions(&state).await?;
    Ok(Json(stats::interactions_over_time(&interactions, period)))
}

pub async fn comment_activity(
    State(state): State<AppState>,
    Query(query): Query<PeriodQuery>,
) -> ApiResult<Json<Vec<Bucket>>> {
    let period = parse_period(&query)?;
    let records = state.db.list_feedback().await?;
    Ok(Json(stats::comment_activity(&records, period)))
}

pub async fn user_ratios(State(state): State<AppState>) -> ApiResult<Json<Vec<UserRatio>>> {
    let (_, interactions) = load_interactions(&state).await?;
    Ok(Json(stats::user_ratios(&interactions)))
}

pub async fn chat_histories(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    Ok(Json(state.source.load_raw().await?))
}

pub async fn export_archive(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> ApiResult<Json<ExportedFile>> {
    let format = match query.format.as_deref() {
        None => ExportFormat::default(),
        Some(raw) => raw.parse().map_err(ApiError::BadRequest)?,
    };
    let archive = state.source.load().await?;
    let exported = state.exports.export(&archive, format).await?;
    Ok(Json(exported))
}
