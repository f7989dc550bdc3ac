//! Axum route handlers for the Matching API.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::index::profile_documents;
use crate::matching::engine::MatchReport;
use crate::models::{JobPosting, Profile};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub scope: String,
    pub posting: JobPosting,
    #[serde(default)]
    pub profile: Profile,
}

#[derive(Debug, Deserialize)]
pub struct RebuildIndexRequest {
    pub profile: Profile,
}

#[derive(Debug, Serialize)]
pub struct RebuildIndexResponse {
    pub scope: String,
    pub documents_indexed: usize,
}

#[derive(Debug, Deserialize)]
pub struct RankSkillsRequest {
    pub skills: Vec<String>,
    #[serde(default)]
    pub posting_text: String,
    pub top_n: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct RankSkillsResponse {
    pub skills: Vec<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/analyze
///
/// Scores a parsed posting against the scope's profile. Builds the scope's
/// index from the supplied profile if it does not exist yet.
pub async fn handle_analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<MatchReport>, AppError> {
    if request.posting.skills.is_empty() && request.posting.missions.is_empty() {
        return Err(AppError::Validation(
            "posting must contain at least one skill or mission".to_string(),
        ));
    }

    let report = state
        .matcher
        .analyze(&request.scope, &request.posting, &request.profile)
        .await?;

    Ok(Json(report))
}

/// PUT /api/v1/index/:scope
///
/// Full rebuild of the scope's index from a profile. Call after every profile change.
pub async fn handle_rebuild_index(
    State(state): State<AppState>,
    Path(scope): Path<String>,
    Json(request): Json<RebuildIndexRequest>,
) -> Result<Json<RebuildIndexResponse>, AppError> {
    let documents_indexed = state
        .index
        .build(&scope, profile_documents(&request.profile))
        .await?;

    Ok(Json(RebuildIndexResponse {
        scope,
        documents_indexed,
    }))
}

/// DELETE /api/v1/index/:scope
pub async fn handle_purge_index(
    State(state): State<AppState>,
    Path(scope): Path<String>,
) -> Result<StatusCode, AppError> {
    if state.index.purge(&scope).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("No index for scope '{scope}'")))
    }
}

/// POST /api/v1/skills/rank
pub async fn handle_rank_skills(
    State(state): State<AppState>,
    Json(request): Json<RankSkillsRequest>,
) -> Result<Json<RankSkillsResponse>, AppError> {
    let top_n = request
        .top_n
        .unwrap_or(state.config.matching.skill_top_n);

    let skills = state
        .skill_ranker
        .rank(&request.skills, &request.posting_text, top_n)
        .await;

    Ok(Json(RankSkillsResponse { skills }))
}
