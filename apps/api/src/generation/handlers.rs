//! Axum route handlers for the Generation API.

use std::path::PathBuf;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::compliance::ValidationReport;
use crate::errors::AppError;
use crate::generation::controller::GenerationState;
use crate::generation::generator::{is_safe_id, session_artifact_path, GenerationRequest};
use crate::models::{Experience, Profile};
use crate::state::AppState;

const DEFAULT_TEMPLATE: &str = "classic";

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub profile: Profile,
    /// Experiences to feature. Empty means all of the profile's experiences.
    #[serde(default)]
    pub experiences: Vec<Experience>,
    pub template_id: Option<String>,
    /// Company the document is addressed to; drives the employer hallucination check.
    pub target_company: Option<String>,
    /// Raw posting text; when present, the profile's skills are narrowed to the most relevant.
    pub job_offer_text: Option<String>,
    /// A previous run's id. If its document still exists it is returned as is.
    pub generation_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub generation_id: String,
    pub artifact_path: PathBuf,
    pub source_path: PathBuf,
    /// `None` for cached documents.
    pub status: Option<GenerationState>,
    pub attempts: u32,
    pub report: Option<ValidationReport>,
    pub cached: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/generate
///
/// Generate → validate → retry. Returns the final document even when it is
/// still non-compliant; `status` and `report` say so.
pub async fn handle_generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, AppError> {
    let output_dir = &state.config.paths.output_dir;

    if let Some(id) = request.generation_id.as_deref().filter(|id| is_safe_id(id)) {
        let cached = session_artifact_path(output_dir, id);
        if tokio::fs::try_exists(&cached).await.unwrap_or(false) {
            info!(generation_id = id, "Serving cached document");
            return Ok(Json(GenerateResponse {
                generation_id: id.to_string(),
                source_path: cached.with_extension("tex"),
                artifact_path: cached,
                status: None,
                attempts: 0,
                report: None,
                cached: true,
            }));
        }
        warn!(generation_id = id, "Cached document not found; generating");
    }

    let mut profile = request.profile;

    if let Some(text) = request.job_offer_text.as_deref().filter(|t| !t.trim().is_empty()) {
        let top_n = state.config.matching.skill_top_n;
        profile.skills = state.skill_ranker.rank(&profile.skills, text, top_n).await;
        info!(kept = profile.skills.len(), "Narrowed profile skills to the posting");
    }

    let experiences = if request.experiences.is_empty() {
        profile.experiences.clone()
    } else {
        request.experiences
    };

    let generation_request = GenerationRequest {
        profile,
        experiences,
        template_id: request
            .template_id
            .unwrap_or_else(|| DEFAULT_TEMPLATE.to_string()),
    };

    let target_company = request
        .target_company
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());

    let outcome = state
        .generation
        .run(&generation_request, target_company)
        .await?;
    info!(
        generation_id = %outcome.session_id,
        status = ?outcome.status,
        attempts = outcome.attempts,
        path = ?outcome.history,
        "Generation finished"
    );

    Ok(Json(GenerateResponse {
        generation_id: outcome.session_id,
        artifact_path: outcome.artifact.artifact_path,
        source_path: outcome.artifact.source_path,
        status: Some(outcome.status),
        attempts: outcome.attempts,
        report: Some(outcome.report),
        cached: false,
    }))
}

/// GET /api/v1/templates
///
/// Returns `<templates_dir>/metadata.json` verbatim, or `[]` when absent.
pub async fn handle_list_templates(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let path = state.config.paths.templates_dir.join("metadata.json");
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let metadata: Value = serde_json::from_slice(&bytes).map_err(|e| {
                AppError::Internal(anyhow::anyhow!("Invalid template metadata: {e}"))
            })?;
            Ok(Json(metadata))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Json(Value::Array(vec![]))),
        Err(e) => Err(AppError::Internal(e.into())),
    }
}
