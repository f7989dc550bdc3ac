// Profile ↔ posting matching: diversified semantic retrieval with keyword
// fallback, hybrid scoring, and skill relevance ranking.

pub mod engine;
pub mod handlers;
pub mod hybrid;
pub mod skill_ranker;

pub use engine::MatchEngine;
pub use skill_ranker::SkillRanker;
