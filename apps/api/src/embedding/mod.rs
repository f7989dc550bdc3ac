//! Embedding backends and the `Embedder` wrapper that degrades failures to zero vectors.
//!
//! Backends (`OpenAiBackend`, `OllamaBackend`) are fallible and know nothing about
//! timeouts. `Embedder` is what the rest of the crate talks to: it bounds every call
//! with a timeout and turns any failure into an all-zero vector of the configured
//! dimension so that similarity math downstream stays well-defined.
//!
//! The backend is chosen once, at construction time, by `create_backend`.

mod ollama;
mod openai;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::config::{EmbeddingBackendKind, EmbeddingConfig};

pub use ollama::OllamaBackend;
pub use openai::OpenAiBackend;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("Embedding call timed out after {0:?}")]
    Timeout(Duration),
}

/// A text → vector backend. One implementation per provider.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Model identifier, e.g. `text-embedding-3-small`.
    fn model_name(&self) -> &str;

    /// Dimension the backend is expected to produce.
    fn dims(&self) -> usize;

    /// Embeds `texts`, returning one vector per input in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

/// Builds the configured backend. Called once per process.
pub fn create_backend(config: &EmbeddingConfig) -> Arc<dyn EmbeddingBackend> {
    match &config.backend {
        EmbeddingBackendKind::OpenAi { api_key } => Arc::new(OpenAiBackend::new(
            api_key.clone(),
            config.model.clone(),
            config.dims,
        )),
        EmbeddingBackendKind::Ollama { url } => Arc::new(OllamaBackend::new(
            url.clone(),
            config.model.clone(),
            config.dims,
        )),
    }
}

/// Timeout-bounded, non-raising front for an `EmbeddingBackend`.
#[derive(Clone)]
pub struct Embedder {
    backend: Arc<dyn EmbeddingBackend>,
    timeout: Duration,
}

impl Embedder {
    pub fn new(backend: Arc<dyn EmbeddingBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }

    pub fn dims(&self) -> usize {
        self.backend.dims()
    }

    /// Like `embed_batch` but surfaces failures instead of degrading.
    /// Rejects responses with the wrong vector count or any vector not `dims()` long,
    /// so real and degraded vectors always share one dimension.
    pub async fn try_embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = tokio::time::timeout(self.timeout, self.backend.embed_batch(texts))
            .await
            .map_err(|_| EmbeddingError::Timeout(self.timeout))??;

        if vectors.len() != texts.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} vectors, got {}",
                texts.len(),
                vectors.len()
            )));
        }

        if let Some((i, v)) = vectors
            .iter()
            .enumerate()
            .find(|(_, v)| v.len() != self.dims())
        {
            return Err(EmbeddingError::InvalidResponse(format!(
                "vector {i} has dimension {}, configured {}; check EMBEDDING_DIMS",
                v.len(),
                self.dims()
            )));
        }

        Ok(vectors)
    }

    /// Embeds a batch. On failure every vector is all-zero at `dims()`.
    pub async fn embed_batch(&self, texts: &[String]) -> Vec<Vec<f32>> {
        match self.try_embed_batch(texts).await {
            Ok(vectors) => vectors,
            Err(e) => {
                warn!(
                    model = self.model_name(),
                    count = texts.len(),
                    "Embedding batch failed, degrading to zero vectors: {e}"
                );
                vec![vec![0.0; self.dims()]; texts.len()]
            }
        }
    }

    /// Embeds a single text. On failure returns an all-zero vector at `dims()`.
    pub async fn embed(&self, text: &str) -> Vec<f32> {
        self.embed_batch(&[text.to_string()])
            .await
            .into_iter()
            .next()
            .unwrap_or_else(|| vec![0.0; self.dims()])
    }
}

/// Scales `v` to unit length in place. Zero vectors are left untouched.
pub fn normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// True if every component is zero (the degraded "no signal" vector).
pub fn is_zero_vector(v: &[f32]) -> bool {
    v.iter().all(|x| *x == 0.0)
}

/// Inner product. Equals cosine similarity when both inputs are unit length.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Cosine similarity in `[-1.0, 1.0]`.
///
/// Returns `0.0` for empty vectors, vectors of different lengths, or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Deterministic, network-free backends for tests.
#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Bag-of-words hashing embedder: each lowercase alphanumeric token adds 1.0
    /// to bucket `fnv(token) % dims`. Texts sharing words get similar vectors.
    pub struct HashingBackend {
        pub dims: usize,
        pub calls: AtomicUsize,
    }

    impl HashingBackend {
        pub fn new(dims: usize) -> Self {
            Self {
                dims,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn vector_for(&self, text: &str) -> Vec<f32> {
            let mut v = vec![0.0f32; self.dims];
            for token in text
                .to_lowercase()
                .split(|c: char| !c.is_alphanumeric())
                .filter(|t| !t.is_empty())
            {
                let mut hash: u64 = 0xcbf29ce484222325;
                for b in token.bytes() {
                    hash ^= b as u64;
                    hash = hash.wrapping_mul(0x100000001b3);
                }
                v[(hash % self.dims as u64) as usize] += 1.0;
            }
            v
        }
    }

    #[async_trait]
    impl EmbeddingBackend for HashingBackend {
        fn model_name(&self) -> &str {
            "hashing-test"
        }

        fn dims(&self) -> usize {
            self.dims
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|t| self.vector_for(t)).collect())
        }
    }

    /// Always fails.
    pub struct FailingBackend {
        pub dims: usize,
    }

    #[async_trait]
    impl EmbeddingBackend for FailingBackend {
        fn model_name(&self) -> &str {
            "failing-test"
        }

        fn dims(&self) -> usize {
            self.dims
        }

        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Err(EmbeddingError::Api {
                status: 503,
                message: "backend unavailable".to_string(),
            })
        }
    }

    /// Never answers within any sane timeout.
    pub struct StuckBackend {
        pub dims: usize,
    }

    #[async_trait]
    impl EmbeddingBackend for StuckBackend {
        fn model_name(&self) -> &str {
            "stuck-test"
        }

        fn dims(&self) -> usize {
            self.dims
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(vec![vec![1.0; self.dims]; texts.len()])
        }
    }

    pub fn hashing_embedder(dims: usize) -> Arc<Embedder> {
        Arc::new(Embedder::new(
            Arc::new(HashingBackend::new(dims)),
            Duration::from_secs(5),
        ))
    }

    pub fn failing_embedder(dims: usize) -> Arc<Embedder> {
        Arc::new(Embedder::new(
            Arc::new(FailingBackend { dims }),
            Duration::from_secs(5),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_normalize_produces_unit_length() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_leaves_zero_vector_alone() {
        let mut v = vec![0.0; 4];
        normalize(&mut v);
        assert!(is_zero_vector(&v));
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_cosine_different_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_dot_equals_cosine_for_unit_vectors() {
        let mut a = vec![1.0, 2.0, 2.0];
        let mut b = vec![2.0, 1.0, 0.5];
        let expected = cosine_similarity(&a, &b);
        normalize(&mut a);
        normalize(&mut b);
        assert!((dot(&a, &b) - expected).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_embed_batch_preserves_order() {
        let embedder = hashing_embedder(32);
        let backend = HashingBackend::new(32);
        let texts = vec!["rust tokio".to_string(), "python pandas".to_string()];
        let vectors = embedder.embed_batch(&texts).await;
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0], backend.vector_for("rust tokio"));
        assert_eq!(vectors[1], backend.vector_for("python pandas"));
    }

    #[tokio::test]
    async fn test_failure_degrades_to_zero_vectors_of_expected_dims() {
        let embedder = failing_embedder(8);
        let vectors = embedder
            .embed_batch(&["a".to_string(), "b".to_string()])
            .await;
        assert_eq!(vectors.len(), 2);
        assert!(vectors.iter().all(|v| v.len() == 8 && is_zero_vector(v)));
    }

    #[tokio::test]
    async fn test_try_embed_batch_surfaces_failure() {
        let embedder = failing_embedder(8);
        assert!(embedder.try_embed_batch(&["a".to_string()]).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_backend_times_out_and_degrades() {
        let embedder = Embedder::new(Arc::new(StuckBackend { dims: 4 }), Duration::from_secs(2));
        let err = embedder
            .try_embed_batch(&["x".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, EmbeddingError::Timeout(_)));

        let v = embedder.embed("x").await;
        assert_eq!(v, vec![0.0; 4]);
    }

    #[tokio::test]
    async fn test_wrong_dimension_is_rejected_then_degraded_to_configured_dims() {
        /// Claims 16 dimensions but returns 8-long vectors.
        struct Misconfigured(HashingBackend);

        #[async_trait]
        impl EmbeddingBackend for Misconfigured {
            fn model_name(&self) -> &str {
                "misconfigured-test"
            }

            fn dims(&self) -> usize {
                16
            }

            async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
                self.0.embed_batch(texts).await
            }
        }

        let embedder = Embedder::new(
            Arc::new(Misconfigured(HashingBackend::new(8))),
            Duration::from_secs(1),
        );
        let err = embedder
            .try_embed_batch(&["rust".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, EmbeddingError::InvalidResponse(_)));
        assert_eq!(embedder.embed("rust").await, vec![0.0; 16]);
    }

    #[tokio::test]
    async fn test_empty_batch_skips_backend() {
        let backend = Arc::new(HashingBackend::new(8));
        let embedder = Embedder::new(backend.clone(), Duration::from_secs(1));
        let out = embedder.embed_batch(&[]).await;
        assert!(out.is_empty());
        assert_eq!(backend.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }
}
