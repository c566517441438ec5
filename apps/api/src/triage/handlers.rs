//! Axum route handlers for the triage session API.

use axum::{extract::State, Json};
use chrono::Utc;
use serde::Deserialize;

use crate::errors::AppError;
use crate::state::AppState;
use crate::triage::selector::VisibilityPolicy;
use crate::triage::session::{open_session, SessionView};

#[derive(Debug, Deserialize)]
pub struct OpenSessionRequest {
    pub user_id: String,
    #[serde(default)]
    pub policy: Option<VisibilityPolicy>,
}

/// POST /api/v1/session/open
///
/// Runs the full session-open flow: delta fetch, candidate selection,
/// cached analysis, and the derived groupings for presentation.
pub async fn handle_open_session(
    State(state): State<AppState>,
    Json(request): Json<OpenSessionRequest>,
) -> Result<Json<SessionView>, AppError> {
    if request.user_id.trim().is_empty() {
        return Err(AppError::Validation("user_id cannot be empty".to_string()));
    }

    let view = open_session(
        state.store.as_ref(),
        state.mail.as_ref(),
        state.analysis.as_ref(),
        state.cache.as_ref(),
        &request.user_id,
        request.policy.unwrap_or_default(),
        Utc::now(),
    )
    .await?;

    Ok(Json(view))
}
