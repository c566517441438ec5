pub mod health;

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use crate::actions::handlers as action_handlers;
use crate::state::AppState;
use crate::triage::handlers as triage_handlers;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Session
        .route(
            "/api/v1/session/open",
            post(triage_handlers::handle_open_session),
        )
        // Conversation actions
        .route(
            "/api/v1/actions/mark-done",
            post(action_handlers::handle_mark_done),
        )
        .route("/api/v1/actions/snooze", post(action_handlers::handle_snooze))
        .route(
            "/api/v1/actions/dismiss",
            post(action_handlers::handle_dismiss),
        )
        .route("/api/v1/actions/flag", post(action_handlers::handle_flag))
        .route("/api/v1/actions/unflag", post(action_handlers::handle_unflag))
        // Saved tasks
        .route("/api/v1/tasks", post(action_handlers::handle_save_task))
        .route(
            "/api/v1/tasks/:task_id",
            delete(action_handlers::handle_unsave_task),
        )
        // Settings
        .route(
            "/api/v1/settings/keywords",
            post(action_handlers::handle_update_keywords),
        )
        .route(
            "/api/v1/settings/tags",
            post(action_handlers::handle_update_tag),
        )
        .route(
            "/api/v1/settings/cache-ttl",
            put(action_handlers::handle_set_cache_ttl),
        )
        // Deadline overrides
        .route(
            "/api/v1/overrides",
            put(action_handlers::handle_set_override)
                .delete(action_handlers::handle_clear_override),
        )
        // State lifecycle
        .route("/api/v1/state", delete(action_handlers::handle_clear_state))
        .with_state(state)
}
