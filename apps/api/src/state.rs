use std::sync::Arc;

use crate::config::Config;
use crate::generation::GenerationController;
use crate::index::VectorIndex;
use crate::matching::{MatchEngine, SkillRanker};

/// Shared application state injected into all route handlers via Axum extractors.
/// Every collaborator is built once in `main` and shared by reference.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub index: Arc<VectorIndex>,
    pub matcher: Arc<MatchEngine>,
    pub skill_ranker: Arc<SkillRanker>,
    pub generation: Arc<GenerationController>,
}
