//! Per-scope vector index.
//!
//! Each scope (one user) owns one flat inner-product index over unit-length
//! vectors plus the documents they were computed from. The index is never
//! patched: every profile change rebuilds it from scratch. That is O(profile)
//! per change, which is fine at one profile per scope.
//!
//! # Consistency
//! - `build` and purges take the scope's write lock; `search` takes the read lock.
//!   A scope's lock entry is dropped on purge once no task holds it.
//! - The container on disk is replaced by atomic rename (see `store`).
//! - A container whose dimension differs from the current query embedding is
//!   stale: it is deleted and the search returns nothing, so the next build
//!   recreates it at the new dimension.
//! - `build` never persists degraded vectors: an embedding failure fails the
//!   build and the previous container stays in place.

pub mod document;
pub mod store;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::embedding::{dot, is_zero_vector, normalize, Embedder, EmbeddingError};

pub use document::{experience_document, profile_documents, Document, DocumentType};
use store::{IndexFile, IndexStore, LoadOutcome};

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Invalid scope '{0}': use 1-128 characters from [A-Za-z0-9_-]")]
    InvalidScope(String),

    #[error("Document at position {position} has empty content")]
    EmptyContent { position: usize },

    #[error("Embedding backend unavailable: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Embedding backend returned unusable vectors: {0}")]
    InvalidEmbedding(String),

    #[error("Index I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Index serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Index internal error: {0}")]
    Internal(String),
}

/// A search hit. The document carries its stored vector in `embedding`.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredDocument {
    pub document: Document,
    pub similarity: f32,
}

pub struct VectorIndex {
    store: IndexStore,
    embedder: Arc<Embedder>,
    locks: Mutex<HashMap<String, Arc<RwLock<()>>>>,
}

impl VectorIndex {
    pub fn new(dir: impl Into<PathBuf>, embedder: Arc<Embedder>) -> Self {
        Self {
            store: IndexStore::new(dir),
            embedder,
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn scope_lock(&self, scope: &str) -> Arc<RwLock<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(scope.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    /// Forgets the scope's lock unless some task still holds a handle to it.
    async fn release_scope_lock(&self, scope: &str) {
        let mut locks = self.locks.lock().await;
        if locks.get(scope).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(scope);
        }
    }

    pub async fn exists(&self, scope: &str) -> Result<bool, IndexError> {
        self.store.exists(scope).await
    }

    /// Replaces the scope's index with one built from `documents`.
    ///
    /// All texts are embedded in one batch and normalized to unit length.
    /// An empty document list removes the index. Returns the number indexed.
    pub async fn build(&self, scope: &str, documents: Vec<Document>) -> Result<usize, IndexError> {
        self.store.path_for(scope)?;

        if let Some(position) = documents.iter().position(|d| d.content.trim().is_empty()) {
            return Err(IndexError::EmptyContent { position });
        }

        if documents.is_empty() {
            self.purge(scope).await?;
            info!(scope, "No documents to index; removed existing index");
            return Ok(0);
        }

        let texts: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
        let vectors = self.embedder.try_embed_batch(&texts).await.map_err(|e| {
            warn!(scope, "Index build aborted, keeping previous index: {e}");
            IndexError::from(e)
        })?;

        let dimension = self.embedder.dims();
        if dimension == 0 || vectors.iter().all(|v| is_zero_vector(v)) {
            warn!(scope, "Index build aborted: backend returned no signal");
            return Err(IndexError::InvalidEmbedding(
                "every vector is all-zero".to_string(),
            ));
        }

        let mut flat = Vec::with_capacity(dimension * vectors.len());
        for mut v in vectors {
            normalize(&mut v);
            flat.extend_from_slice(&v);
        }

        let count = documents.len();
        let file = IndexFile {
            dimension,
            model: self.embedder.model_name().to_string(),
            built_at: Utc::now(),
            vectors: flat,
            documents: documents
                .into_iter()
                .map(|mut d| {
                    d.embedding = None;
                    d
                })
                .collect(),
        };

        let lock = self.scope_lock(scope).await;
        let _guard = lock.write().await;
        self.store.save(scope, file).await?;

        info!(scope, documents = count, dimension, "Vector index rebuilt");
        Ok(count)
    }

    /// Returns up to `top_n` documents by descending cosine similarity to `query`.
    ///
    /// `filter` restricts candidates to one document type before truncation.
    /// A scope with no index yields an empty list; so does a stale one, after
    /// it has been deleted.
    pub async fn search(
        &self,
        scope: &str,
        query: &str,
        top_n: usize,
        filter: Option<DocumentType>,
    ) -> Result<Vec<ScoredDocument>, IndexError> {
        self.store.path_for(scope)?;

        if top_n == 0 || !self.store.exists(scope).await? {
            return Ok(Vec::new());
        }

        let mut query_vec = self.embedder.embed(query).await;
        normalize(&mut query_vec);

        let lock = self.scope_lock(scope).await;

        let stale_reason = {
            let _guard = lock.read().await;
            match self.store.load(scope).await? {
                LoadOutcome::Missing => return Ok(Vec::new()),
                LoadOutcome::Loaded(file) if file.dimension == query_vec.len() => {
                    let hits = rank(&file, &query_vec, top_n, filter);
                    debug!(scope, hits = hits.len(), "Vector search complete");
                    return Ok(hits);
                }
                LoadOutcome::Loaded(file) => format!(
                    "index dimension {} does not match query dimension {}",
                    file.dimension,
                    query_vec.len()
                ),
                LoadOutcome::Corrupt(reason) => reason,
            }
        };

        let _guard = lock.write().await;
        // A rebuild may have landed between the two lock acquisitions.
        let still_stale = match self.store.load(scope).await? {
            LoadOutcome::Loaded(file) => file.dimension != query_vec.len(),
            LoadOutcome::Corrupt(_) => true,
            LoadOutcome::Missing => false,
        };
        if still_stale {
            self.store.remove(scope).await?;
            warn!(scope, "Purged stale vector index: {stale_reason}");
        }

        Ok(Vec::new())
    }

    /// Deletes the scope's index, if any.
    pub async fn purge(&self, scope: &str) -> Result<bool, IndexError> {
        let lock = self.scope_lock(scope).await;
        let removed = {
            let _guard = lock.write().await;
            self.store.remove(scope).await
        };
        drop(lock);
        self.release_scope_lock(scope).await;
        removed
    }
}

fn rank(
    file: &IndexFile,
    query: &[f32],
    top_n: usize,
    filter: Option<DocumentType>,
) -> Vec<ScoredDocument> {
    let mut scored: Vec<(f32, usize)> = file
        .documents
        .iter()
        .zip(file.rows())
        .enumerate()
        .filter(|(_, (doc, _))| filter.map_or(true, |t| doc.doc_type == t))
        .map(|(i, (_, row))| (dot(row, query), i))
        .collect();

    // Descending score; ties keep index order so results are deterministic.
    scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
    scored.truncate(top_n);

    let rows: Vec<&[f32]> = file.rows().collect();
    scored
        .into_iter()
        .map(|(similarity, i)| {
            let mut document = file.documents[i].clone();
            document.embedding = Some(rows[i].to_vec());
            ScoredDocument {
                document,
                similarity,
            }
        })
        .collect()
}
