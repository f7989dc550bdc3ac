//! Hybrid relevance score: semantic similarity blended with skill overlap.

use crate::config::ScoringConfig;

use super::engine::{MatchOrigin, MatchResult};

/// Blends the semantic and keyword components into a 0–100 score.
///
/// - semantic: mean similarity of semantic matches × 100; the configured
///   fallback constant when every match came from keyword fallback; 0 with no
///   matches at all.
/// - keyword: share of `posting_skills` that fuzzily match some profile skill.
pub fn hybrid_score(
    matches: &[MatchResult],
    posting_skills: &[String],
    profile_skills: &[String],
    config: &ScoringConfig,
) -> u32 {
    let semantic = semantic_component(matches, config);
    let keyword = keyword_component(posting_skills, profile_skills, config.fuzzy_threshold);

    let blended = config.semantic_weight * semantic + config.keyword_weight * keyword;
    blended.round().clamp(0.0, 100.0) as u32
}

fn semantic_component(matches: &[MatchResult], config: &ScoringConfig) -> f64 {
    let semantic: Vec<f64> = matches
        .iter()
        .filter(|m| m.origin == MatchOrigin::Semantic)
        .map(|m| m.similarity as f64)
        .collect();

    if !semantic.is_empty() {
        return semantic.iter().sum::<f64>() / semantic.len() as f64 * 100.0;
    }
    if matches.is_empty() {
        0.0
    } else {
        config.fallback_semantic_score
    }
}

/// Percentage (0–100) of posting skills found among the profile skills.
pub fn keyword_component(posting_skills: &[String], profile_skills: &[String], threshold: f64) -> f64 {
    let wanted: Vec<String> = posting_skills
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();
    if wanted.is_empty() {
        return 0.0;
    }

    let have: Vec<String> = profile_skills
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();

    let found = wanted
        .iter()
        .filter(|w| have.iter().any(|h| fuzzy_ratio(w, h) >= threshold))
        .count();

    found as f64 / wanted.len() as f64 * 100.0
}

/// Normalized indel similarity in `[0, 100]`: `2 * LCS / (len_a + len_b) * 100`.
///
/// Two empty strings are identical (100).
pub fn fuzzy_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 100.0;
    }

    // Single-row LCS table.
    let mut row = vec![0usize; b.len() + 1];
    for ca in &a {
        let mut diag = 0;
        for (j, cb) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if ca == cb {
                diag + 1
            } else {
                above.max(row[j])
            };
            diag = above;
        }
    }
    let lcs = row[b.len()];

    2.0 * lcs as f64 / total as f64 * 100.0
}
