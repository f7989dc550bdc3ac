pub mod health;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::generation::handlers as generation;
use crate::matching::handlers as matching;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Matching API
        .route("/api/v1/analyze", post(matching::handle_analyze))
        .route(
            "/api/v1/index/:scope",
            put(matching::handle_rebuild_index).delete(matching::handle_purge_index),
        )
        .route("/api/v1/skills/rank", post(matching::handle_rank_skills))
        // Generation API
        .route("/api/v1/generate", post(generation::handle_generate))
        .route("/api/v1/templates", get(generation::handle_list_templates))
        .with_state(state)
}
