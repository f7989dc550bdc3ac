use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub anthropic_api_key: String,
    pub paths: PathsConfig,
    pub embedding: EmbeddingConfig,
    pub compiler: CompilerConfig,
    pub scoring: ScoringConfig,
    pub matching: MatchingConfig,
    pub generation: GenerationConfig,
}

#[derive(Debug, Clone)]
pub struct PathsConfig {
    /// Root for persisted per-scope indexes (`<data_dir>/embeddings`).
    pub data_dir: PathBuf,
    /// One sub-directory per generation session.
    pub output_dir: PathBuf,
    pub templates_dir: PathBuf,
}

impl PathsConfig {
    pub fn embeddings_dir(&self) -> PathBuf {
        self.data_dir.join("embeddings")
    }
}

/// Which embedding backend to construct at startup.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbeddingBackendKind {
    OpenAi { api_key: String },
    Ollama { url: String },
}

impl EmbeddingBackendKind {
    /// Model and output dimension used when `EMBEDDING_MODEL` / `EMBEDDING_DIMS` are unset.
    pub fn default_model(&self) -> (&'static str, usize) {
        match self {
            Self::OpenAi { .. } => ("text-embedding-3-small", 1536),
            Self::Ollama { .. } => ("nomic-embed-text", 768),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackendKind,
    pub model: String,
    pub dims: usize,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CompilerConfig {
    pub binary: String,
    pub timeout: Duration,
}

/// Hybrid score weights. The defaults have no derivation beyond "they worked";
/// keep them overridable rather than tuning them in code.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    pub semantic_weight: f64,
    pub keyword_weight: f64,
    /// Semantic component used when matches only came from the keyword fallback.
    pub fallback_semantic_score: f64,
    /// Minimum similarity ratio (0–100) for a posting skill to count as present.
    pub fuzzy_threshold: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            semantic_weight: 0.6,
            keyword_weight: 0.4,
            fallback_semantic_score: 20.0,
            fuzzy_threshold: 85.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchingConfig {
    /// Candidates requested from the index before diversification.
    pub candidate_pool: usize,
    pub top_n: usize,
    pub diversity_threshold: f32,
    /// Skills kept when a profile is filtered against a posting for generation.
    pub skill_top_n: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            candidate_pool: 15,
            top_n: 3,
            diversity_threshold: 0.92,
            skill_top_n: 15,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Retries beyond the first attempt.
    pub max_retries: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let scoring_defaults = ScoringConfig::default();
        let matching_defaults = MatchingConfig::default();

        let backend = match optional_env("EMBEDDING_PROVIDER")
            .unwrap_or_else(|| "openai".to_string())
            .to_lowercase()
            .as_str()
        {
            "openai" => EmbeddingBackendKind::OpenAi {
                api_key: require_env("OPENAI_API_KEY")?,
            },
            "ollama" => EmbeddingBackendKind::Ollama {
                url: optional_env("OLLAMA_URL")
                    .unwrap_or_else(|| "http://localhost:11434".to_string()),
            },
            other => anyhow::bail!("EMBEDDING_PROVIDER must be 'openai' or 'ollama', got '{other}'"),
        };

        let (default_model, default_dims) = backend.default_model();

        Ok(Config {
            port: parse_env("PORT", 8080u16)?,
            rust_log: optional_env("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            paths: PathsConfig {
                data_dir: optional_env("DATA_DIR")
                    .unwrap_or_else(|| "data".to_string())
                    .into(),
                output_dir: optional_env("OUTPUT_DIR")
                    .unwrap_or_else(|| "outputs/generated_cvs".to_string())
                    .into(),
                templates_dir: optional_env("TEMPLATES_DIR")
                    .unwrap_or_else(|| "templates".to_string())
                    .into(),
            },
            embedding: EmbeddingConfig {
                backend,
                model: optional_env("EMBEDDING_MODEL").unwrap_or_else(|| default_model.to_string()),
                dims: parse_env("EMBEDDING_DIMS", default_dims)?,
                timeout: Duration::from_secs(parse_env("EMBEDDING_TIMEOUT_SECS", 30u64)?),
            },
            compiler: CompilerConfig {
                binary: optional_env("COMPILER_BIN").unwrap_or_else(|| "pdflatex".to_string()),
                timeout: Duration::from_secs(parse_env("COMPILER_TIMEOUT_SECS", 120u64)?),
            },
            scoring: ScoringConfig {
                semantic_weight: parse_env(
                    "SCORE_SEMANTIC_WEIGHT",
                    scoring_defaults.semantic_weight,
                )?,
                keyword_weight: parse_env("SCORE_KEYWORD_WEIGHT", scoring_defaults.keyword_weight)?,
                fallback_semantic_score: parse_env(
                    "SCORE_FALLBACK_SEMANTIC",
                    scoring_defaults.fallback_semantic_score,
                )?,
                fuzzy_threshold: parse_env(
                    "FUZZY_MATCH_THRESHOLD",
                    scoring_defaults.fuzzy_threshold,
                )?,
            },
            matching: MatchingConfig {
                candidate_pool: parse_env("MATCH_CANDIDATE_POOL", matching_defaults.candidate_pool)?,
                top_n: parse_env("MATCH_TOP_N", matching_defaults.top_n)?,
                diversity_threshold: parse_env(
                    "DIVERSITY_THRESHOLD",
                    matching_defaults.diversity_threshold,
                )?,
                skill_top_n: parse_env("SKILL_TOP_N", matching_defaults.skill_top_n)?,
            },
            generation: GenerationConfig {
                max_retries: parse_env("GENERATION_MAX_RETRIES", 2u32)?,
            },
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional_env(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("{key} has an invalid value '{raw}': {e}"))
}
