//! Posting → profile matching.
//!
//! Flow: compose_query → retrieve (experience documents only) → diversify →
//! keyword fallback when nothing survives → hybrid score → report.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{MatchingConfig, ScoringConfig};
use crate::embedding::cosine_similarity;
use crate::index::{
    experience_document, profile_documents, Document, DocumentType, IndexError, ScoredDocument,
    VectorIndex,
};
use crate::models::{first_sentence, Experience, JobPosting, Profile};

use super::hybrid::hybrid_score;

/// Number of posting skills echoed back in a report.
const REPORT_SKILLS: usize = 10;
const KEYWORD_HITS_KEY: &str = "_keyword_hits";
const NO_MATCH_BULLET: &str = "No relevant experiences found in the profile.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOrigin {
    Semantic,
    KeywordFallback,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchResult {
    pub document: Document,
    pub similarity: f32,
    pub origin: MatchOrigin,
}

impl MatchResult {
    fn semantic(hit: ScoredDocument) -> Self {
        Self {
            document: hit.document,
            similarity: hit.similarity,
            origin: MatchOrigin::Semantic,
        }
    }

    /// `"<title>: <first sentence of description>"`.
    pub fn bullet(&self) -> String {
        let doc = &self.document;
        let title = doc.meta("title").unwrap_or("Experience");
        let sentence = first_sentence(doc.meta("description").unwrap_or(doc.content.as_str()));
        format!("{title}: {sentence}")
    }

    fn sanitized(self) -> Self {
        Self {
            document: self.document.sanitized(),
            ..self
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchReport {
    pub score: u32,
    pub summary: String,
    pub skills: Vec<String>,
    pub bullet_points: Vec<String>,
    pub matches: Vec<MatchResult>,
}

pub struct MatchEngine {
    index: Arc<VectorIndex>,
    matching: MatchingConfig,
    scoring: ScoringConfig,
}

impl MatchEngine {
    pub fn new(index: Arc<VectorIndex>, matching: MatchingConfig, scoring: ScoringConfig) -> Self {
        Self {
            index,
            matching,
            scoring,
        }
    }

    /// The single semantic query for a posting: `"Skills: a, b. Missions: m1 m2"`.
    pub fn compose_query(posting: &JobPosting) -> String {
        format!(
            "Skills: {}. Missions: {}",
            posting.skills.join(", "),
            posting.missions.join(" ")
        )
    }

    /// Experience candidates for `query`, best first, capped at the candidate pool.
    pub async fn retrieve(&self, scope: &str, query: &str) -> Result<Vec<ScoredDocument>, IndexError> {
        self.index
            .search(
                scope,
                query,
                self.matching.candidate_pool,
                Some(DocumentType::Experience),
            )
            .await
    }

    /// Full analysis of `posting` against the scope's profile.
    ///
    /// Builds the scope's index from `profile` when none exists yet.
    pub async fn analyze(
        &self,
        scope: &str,
        posting: &JobPosting,
        profile: &Profile,
    ) -> Result<MatchReport, IndexError> {
        let query = Self::compose_query(posting);

        let mut candidates = self.retrieve(scope, &query).await?;
        if candidates.is_empty() && !profile.is_empty() && !self.index.exists(scope).await? {
            info!(scope, "No index for scope; building from profile");
            match self.index.build(scope, profile_documents(profile)).await {
                Ok(_) => candidates = self.retrieve(scope, &query).await?,
                // Leave the scope unindexed; the next analysis retries the build.
                Err(e @ (IndexError::Embedding(_) | IndexError::InvalidEmbedding(_))) => {
                    warn!(scope, "Lazy index build failed: {e}");
                }
                Err(e) => return Err(e),
            }
        }

        let mut matches: Vec<MatchResult> = diversify(
            candidates,
            self.matching.top_n,
            self.matching.diversity_threshold,
        )
        .into_iter()
        .map(MatchResult::semantic)
        .collect();

        if matches.is_empty() && !profile.experiences.is_empty() {
            matches =
                fallback_keyword_match(&posting.skills, &profile.experiences, self.matching.top_n);
            info!(
                scope,
                found = matches.len(),
                "Semantic retrieval empty; used keyword fallback"
            );
        }

        let score = hybrid_score(&matches, &posting.skills, &profile.skills, &self.scoring);

        let bullet_points = if matches.is_empty() {
            vec![NO_MATCH_BULLET.to_string()]
        } else {
            matches.iter().map(MatchResult::bullet).collect()
        };

        debug!(scope, score, matches = matches.len(), "Analysis complete");

        Ok(MatchReport {
            score,
            summary: format!("Profile match: {score}% based on hybrid analysis."),
            skills: posting.skills.iter().take(REPORT_SKILLS).cloned().collect(),
            bullet_points,
            matches: matches.into_iter().map(MatchResult::sanitized).collect(),
        })
    }
}

/// Greedy near-duplicate filter over candidates sorted best-first.
///
/// A candidate is accepted only if its cosine similarity to every accepted
/// candidate is below `threshold`. Candidates without an embedding are skipped.
pub fn diversify(
    candidates: Vec<ScoredDocument>,
    top_n: usize,
    threshold: f32,
) -> Vec<ScoredDocument> {
    let mut accepted: Vec<ScoredDocument> = Vec::with_capacity(top_n);

    for candidate in candidates {
        if accepted.len() >= top_n {
            break;
        }
        let Some(embedding) = candidate.document.embedding.as_deref() else {
            continue;
        };

        let distinct = accepted.iter().all(|kept| {
            kept.document
                .embedding
                .as_deref()
                .map_or(true, |other| cosine_similarity(embedding, other) < threshold)
        });
        if distinct {
            accepted.push(candidate);
        }
    }

    accepted
}

/// Substring keyword match used when semantic retrieval yields nothing.
///
/// An experience scores one point per posting skill whose lowercase form
/// appears in `"<title> <description>"`. Zero-score experiences are dropped.
pub fn fallback_keyword_match(
    posting_skills: &[String],
    experiences: &[Experience],
    top_n: usize,
) -> Vec<MatchResult> {
    let skills: Vec<String> = posting_skills
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();

    let mut scored: Vec<(usize, &Experience)> = experiences
        .iter()
        .map(|exp| {
            let haystack = format!("{} {}", exp.title, exp.description).to_lowercase();
            let hits = skills.iter().filter(|s| haystack.contains(s.as_str())).count();
            (hits, exp)
        })
        .filter(|(hits, _)| *hits > 0)
        .collect();

    // Stable: equal scores keep profile order.
    scored.sort_by(|a, b| b.0.cmp(&a.0));

    scored
        .into_iter()
        .take(top_n)
        .map(|(hits, exp)| MatchResult {
            document: experience_document(exp).with_meta(KEYWORD_HITS_KEY, hits.to_string()),
            similarity: 0.0,
            origin: MatchOrigin::KeywordFallback,
        })
        .collect()
}
