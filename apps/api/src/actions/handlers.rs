//! Axum route handlers for user actions and settings.
//!
//! Every mutating handler finishes with a re-derivation of the presentation
//! groupings from the current cache contents, so the client can re-render
//! without another session open.

use std::collections::BTreeSet;

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::actions;
use crate::actions::NewSavedTask;
use crate::errors::AppError;
use crate::models::state::{DeadlineOverride, SavedTask, UserKeyword};
use crate::state::AppState;
use crate::triage::session::{rederive, DerivedView};

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ConversationActionRequest {
    pub user_id: String,
    pub conversation_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SnoozeRequest {
    pub user_id: String,
    pub conversation_id: String,
    pub until: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct FlagRequest {
    pub user_id: String,
    pub conversation_id: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

#[derive(Debug, Deserialize)]
pub struct SaveTaskRequest {
    pub user_id: String,
    #[serde(flatten)]
    pub task: NewSavedTask,
}

#[derive(Debug, Deserialize)]
pub struct UserIdRequest {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateKeywordsRequest {
    pub user_id: String,
    #[serde(default)]
    pub add_keywords: Vec<UserKeyword>,
    #[serde(default)]
    pub remove_keywords: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTagRequest {
    pub user_id: String,
    pub tag: String,
    #[serde(default)]
    pub remove: bool,
}

#[derive(Debug, Deserialize)]
pub struct CacheTtlRequest {
    pub user_id: String,
    pub minutes: u32,
}

#[derive(Debug, Deserialize)]
pub struct OverrideRequest {
    pub user_id: String,
    #[serde(flatten)]
    pub value: DeadlineOverride,
}

#[derive(Debug, Deserialize)]
pub struct ClearOverrideRequest {
    pub user_id: String,
    pub conversation_id: String,
    pub task_index: usize,
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub ok: bool,
    pub view: DerivedView,
}

#[derive(Debug, Serialize)]
pub struct SaveTaskResponse {
    pub task: SavedTask,
    pub view: DerivedView,
}

#[derive(Debug, Serialize)]
pub struct KeywordsResponse {
    pub keywords: Vec<UserKeyword>,
}

#[derive(Debug, Serialize)]
pub struct TagsResponse {
    pub tags: Vec<String>,
}

async fn rederived(state: &AppState, user_id: &str) -> Result<DerivedView, AppError> {
    Ok(rederive(state.store.as_ref(), state.cache.as_ref(), user_id, Utc::now()).await?)
}

// ────────────────────────────────────────────────────────────────────────────
// Conversation actions
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/actions/mark-done
pub async fn handle_mark_done(
    State(state): State<AppState>,
    Json(request): Json<ConversationActionRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    actions::mark_done(
        state.store.as_ref(),
        state.cache.as_ref(),
        &request.user_id,
        &request.conversation_id,
    )
    .await?;
    let view = rederived(&state, &request.user_id).await?;
    Ok(Json(ActionResponse { ok: true, view }))
}

/// POST /api/v1/actions/snooze
pub async fn handle_snooze(
    State(state): State<AppState>,
    Json(request): Json<SnoozeRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    if request.until <= Utc::now() {
        return Err(AppError::Validation(
            "snooze wake time must be in the future".to_string(),
        ));
    }
    actions::snooze(
        state.store.as_ref(),
        &request.user_id,
        &request.conversation_id,
        request.until,
    )
    .await?;
    let view = rederived(&state, &request.user_id).await?;
    Ok(Json(ActionResponse { ok: true, view }))
}

/// POST /api/v1/actions/dismiss
pub async fn handle_dismiss(
    State(state): State<AppState>,
    Json(request): Json<ConversationActionRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    actions::dismiss(
        state.store.as_ref(),
        state.cache.as_ref(),
        &request.user_id,
        &request.conversation_id,
    )
    .await?;
    let view = rederived(&state, &request.user_id).await?;
    Ok(Json(ActionResponse { ok: true, view }))
}

/// POST /api/v1/actions/flag
pub async fn handle_flag(
    State(state): State<AppState>,
    Json(request): Json<FlagRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    actions::flag(
        state.store.as_ref(),
        &request.user_id,
        &request.conversation_id,
        &request.subject,
        request.tags,
        Utc::now(),
    )
    .await?;
    let view = rederived(&state, &request.user_id).await?;
    Ok(Json(ActionResponse { ok: true, view }))
}

/// POST /api/v1/actions/unflag
pub async fn handle_unflag(
    State(state): State<AppState>,
    Json(request): Json<ConversationActionRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    let removed = actions::unflag(
        state.store.as_ref(),
        &request.user_id,
        &request.conversation_id,
    )
    .await?;
    if !removed {
        return Err(AppError::NotFound(format!(
            "No flag for conversation {}",
            request.conversation_id
        )));
    }
    let view = rederived(&state, &request.user_id).await?;
    Ok(Json(ActionResponse { ok: true, view }))
}

// ────────────────────────────────────────────────────────────────────────────
// Saved tasks
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/tasks
pub async fn handle_save_task(
    State(state): State<AppState>,
    Json(request): Json<SaveTaskRequest>,
) -> Result<Json<SaveTaskResponse>, AppError> {
    if request.task.title.trim().is_empty() {
        return Err(AppError::Validation("task title cannot be empty".to_string()));
    }
    let task = actions::save_task(
        state.store.as_ref(),
        &request.user_id,
        request.task,
        Utc::now(),
    )
    .await?;
    let view = rederived(&state, &request.user_id).await?;
    Ok(Json(SaveTaskResponse { task, view }))
}

/// DELETE /api/v1/tasks/:task_id
pub async fn handle_unsave_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    Json(request): Json<UserIdRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    let removed =
        actions::unsave_task(state.store.as_ref(), &request.user_id, &task_id).await?;
    if !removed {
        return Err(AppError::NotFound(format!("Task {task_id} not found")));
    }
    let view = rederived(&state, &request.user_id).await?;
    Ok(Json(ActionResponse { ok: true, view }))
}

// ────────────────────────────────────────────────────────────────────────────
// Settings
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/settings/keywords
pub async fn handle_update_keywords(
    State(state): State<AppState>,
    Json(request): Json<UpdateKeywordsRequest>,
) -> Result<Json<KeywordsResponse>, AppError> {
    if request.add_keywords.iter().any(|k| k.term.trim().is_empty()) {
        return Err(AppError::Validation(
            "keyword term cannot be empty".to_string(),
        ));
    }
    let keywords = actions::update_keywords(
        state.store.as_ref(),
        &state.settings_sync,
        &request.user_id,
        request.add_keywords,
        request.remove_keywords,
    )
    .await?;
    Ok(Json(KeywordsResponse { keywords }))
}

/// POST /api/v1/settings/tags
pub async fn handle_update_tag(
    State(state): State<AppState>,
    Json(request): Json<UpdateTagRequest>,
) -> Result<Json<TagsResponse>, AppError> {
    if request.tag.trim().is_empty() {
        return Err(AppError::Validation("tag cannot be empty".to_string()));
    }
    let tags = if request.remove {
        actions::remove_tag(
            state.store.as_ref(),
            &state.settings_sync,
            &request.user_id,
            &request.tag,
        )
        .await?
    } else {
        actions::add_tag(
            state.store.as_ref(),
            &state.settings_sync,
            &request.user_id,
            &request.tag,
        )
        .await?
    };
    Ok(Json(TagsResponse { tags }))
}

/// PUT /api/v1/settings/cache-ttl
pub async fn handle_set_cache_ttl(
    State(state): State<AppState>,
    Json(request): Json<CacheTtlRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if request.minutes == 0 {
        return Err(AppError::Validation(
            "cache TTL must be at least one minute".to_string(),
        ));
    }
    actions::set_cache_ttl(state.store.as_ref(), &request.user_id, request.minutes).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

// ────────────────────────────────────────────────────────────────────────────
// Deadline overrides
// ────────────────────────────────────────────────────────────────────────────

/// PUT /api/v1/overrides
pub async fn handle_set_override(
    State(state): State<AppState>,
    Json(request): Json<OverrideRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    actions::set_deadline_override(state.store.as_ref(), &request.user_id, request.value)
        .await?;
    let view = rederived(&state, &request.user_id).await?;
    Ok(Json(ActionResponse { ok: true, view }))
}

/// DELETE /api/v1/overrides
pub async fn handle_clear_override(
    State(state): State<AppState>,
    Json(request): Json<ClearOverrideRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    let removed = actions::clear_deadline_override(
        state.store.as_ref(),
        &request.user_id,
        &request.conversation_id,
        request.task_index,
    )
    .await?;
    if !removed {
        return Err(AppError::NotFound(format!(
            "No override for conversation {} task {}",
            request.conversation_id, request.task_index
        )));
    }
    let view = rederived(&state, &request.user_id).await?;
    Ok(Json(ActionResponse { ok: true, view }))
}

// ────────────────────────────────────────────────────────────────────────────
// State lifecycle
// ────────────────────────────────────────────────────────────────────────────

/// DELETE /api/v1/state
pub async fn handle_clear_state(
    State(state): State<AppState>,
    Json(request): Json<UserIdRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    actions::clear_state(state.store.as_ref(), state.cache.as_ref(), &request.user_id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}
