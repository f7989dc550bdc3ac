//! On-disk persistence for one scope's index.
//!
//! Vectors and documents live in a single JSON container so they can never drift
//! apart. Writes land in a temp file inside the target directory and are renamed
//! over the old container, so a reader sees either the old index or the new one.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::document::Document;
use super::IndexError;

const FILE_SUFFIX: &str = ".index.json";
const MAX_SCOPE_LEN: usize = 128;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexFile {
    pub dimension: usize,
    pub model: String,
    pub built_at: DateTime<Utc>,
    /// Unit-length vectors, row-major, one row per document.
    pub vectors: Vec<f32>,
    pub documents: Vec<Document>,
}

impl IndexFile {
    /// `len(vectors) == len(documents)` with every row at `dimension`.
    pub fn is_consistent(&self) -> bool {
        self.dimension > 0 && self.vectors.len() == self.dimension * self.documents.len()
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.vectors.chunks_exact(self.dimension.max(1))
    }
}

#[derive(Debug)]
pub enum LoadOutcome {
    Missing,
    Loaded(IndexFile),
    /// Present but unreadable or internally inconsistent.
    Corrupt(String),
}

#[derive(Debug, Clone)]
pub struct IndexStore {
    dir: PathBuf,
}

impl IndexStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Scopes become file names, so only `[A-Za-z0-9_-]` is accepted.
    pub fn path_for(&self, scope: &str) -> Result<PathBuf, IndexError> {
        let valid = !scope.is_empty()
            && scope.len() <= MAX_SCOPE_LEN
            && scope
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(IndexError::InvalidScope(scope.to_string()));
        }
        Ok(self.dir.join(format!("{scope}{FILE_SUFFIX}")))
    }

    pub async fn exists(&self, scope: &str) -> Result<bool, IndexError> {
        let path = self.path_for(scope)?;
        Ok(tokio::fs::try_exists(&path).await.unwrap_or(false))
    }

    pub async fn load(&self, scope: &str) -> Result<LoadOutcome, IndexError> {
        let path = self.path_for(scope)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(LoadOutcome::Missing),
            Err(e) => return Err(IndexError::Io(e)),
        };

        let file: IndexFile = match serde_json::from_slice(&bytes) {
            Ok(f) => f,
            Err(e) => return Ok(LoadOutcome::Corrupt(format!("unparseable container: {e}"))),
        };

        if !file.is_consistent() {
            return Ok(LoadOutcome::Corrupt(format!(
                "{} vector values for {} documents at dimension {}",
                file.vectors.len(),
                file.documents.len(),
                file.dimension
            )));
        }

        Ok(LoadOutcome::Loaded(file))
    }

    /// Atomically replaces the scope's container.
    pub async fn save(&self, scope: &str, file: IndexFile) -> Result<(), IndexError> {
        let path = self.path_for(scope)?;
        let dir = self.dir.clone();

        tokio::task::spawn_blocking(move || write_atomic(&dir, &path, &file))
            .await
            .map_err(|e| IndexError::Internal(format!("index write task failed: {e}")))?
    }

    /// Removes the scope's container. Returns whether anything was deleted.
    pub async fn remove(&self, scope: &str) -> Result<bool, IndexError> {
        let path = self.path_for(scope)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(IndexError::Io(e)),
        }
    }
}

fn write_atomic(dir: &Path, path: &Path, file: &IndexFile) -> Result<(), IndexError> {
    std::fs::create_dir_all(dir)?;

    let tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        serde_json::to_writer(&mut writer, file)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| IndexError::Io(e.error))?;
    Ok(())
}
