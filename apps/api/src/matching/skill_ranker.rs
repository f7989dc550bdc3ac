use std::sync::Arc;

use tracing::warn;

use crate::embedding::{cosine_similarity, is_zero_vector, Embedder};

/// Orders skills by semantic relevance to a posting.
pub struct SkillRanker {
    embedder: Arc<Embedder>,
}

impl SkillRanker {
    pub fn new(embedder: Arc<Embedder>) -> Self {
        Self { embedder }
    }

    /// Returns the `top_n` skill names most similar to `posting_text`, best first.
    ///
    /// Never fails: with empty input, or when embedding fails or yields no
    /// signal, the first `top_n` skills are returned in their original order.
    pub async fn rank(&self, skills: &[String], posting_text: &str, top_n: usize) -> Vec<String> {
        let unchanged = || skills.iter().take(top_n).cloned().collect::<Vec<_>>();

        if skills.is_empty() || posting_text.trim().is_empty() || top_n == 0 {
            return unchanged();
        }

        let mut texts = Vec::with_capacity(skills.len() + 1);
        texts.push(posting_text.to_string());
        texts.extend(skills.iter().cloned());

        let vectors = match self.embedder.try_embed_batch(&texts).await {
            Ok(v) => v,
            Err(e) => {
                warn!("Skill ranking fell back to original order: {e}");
                return unchanged();
            }
        };

        let (query, skill_vectors) = match vectors.split_first() {
            Some((q, rest)) if !is_zero_vector(q) => (q, rest),
            _ => {
                warn!("Skill ranking got no signal for the posting; keeping original order");
                return unchanged();
            }
        };

        let mut scored: Vec<(f32, &String)> = skill_vectors
            .iter()
            .zip(skills)
            .map(|(v, skill)| (cosine_similarity(query, v), skill))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        scored
            .into_iter()
            .take(top_n)
            .map(|(_, skill)| skill.clone())
            .collect()
    }
}
