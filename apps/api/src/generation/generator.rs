//! Document generation: LLM fills a LaTeX template, the compiler renders it.
//!
//! Every generation run lives in one session directory
//! `<output_dir>/<session_id>/` holding `<session_id>.tex`, `<session_id>.pdf`
//! and the compiler log. Retries pass the same session id back in so all
//! attempts land in the same directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::compliance::{CompileError, DocumentCompiler};
use crate::generation::prompts::{build_generation_prompt, generation_system};
use crate::llm_client::{LlmError, TextCompleter};
use crate::models::{Experience, Profile};

const SESSION_PREFIX: &str = "rezume_llm_";
/// Compiler by-products removed after a successful render. The log is kept.
const AUX_EXTENSIONS: &[&str] = &["aux", "out", "toc", "synctex.gz"];

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Template '{0}' not found")]
    TemplateNotFound(String),

    #[error("Invalid identifier '{0}'")]
    InvalidId(String),

    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Compilation failed: {0}")]
    Compile(#[from] CompileError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub profile: Profile,
    pub experiences: Vec<Experience>,
    pub template_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedArtifact {
    pub session_id: String,
    pub artifact_path: PathBuf,
    pub source_path: PathBuf,
}

#[async_trait]
pub trait DocumentGenerator: Send + Sync {
    /// Produces one document. `session_id` reuses an existing session directory;
    /// `None` starts a new one.
    ///
    /// Fails only when generation itself broke: the LLM call, file I/O, or a
    /// compiler that is missing or hung. A source that compiles badly, with or
    /// without a PDF, is still returned; the validator reports it.
    async fn generate(
        &self,
        request: &GenerationRequest,
        feedback: Option<&str>,
        session_id: Option<&str>,
    ) -> Result<GeneratedArtifact, GenerationError>;
}

/// Session and template ids become path components.
pub fn is_safe_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

pub fn new_session_id() -> String {
    format!("{SESSION_PREFIX}{}", Uuid::new_v4().simple())
}

/// `<output_dir>/<id>/<id>.pdf`
pub fn session_artifact_path(output_dir: &Path, session_id: &str) -> PathBuf {
    output_dir
        .join(session_id)
        .join(format!("{session_id}.pdf"))
}

pub struct LlmDocumentGenerator {
    llm: Arc<dyn TextCompleter>,
    compiler: Arc<dyn DocumentCompiler>,
    templates_dir: PathBuf,
    output_dir: PathBuf,
}

impl LlmDocumentGenerator {
    pub fn new(
        llm: Arc<dyn TextCompleter>,
        compiler: Arc<dyn DocumentCompiler>,
        templates_dir: PathBuf,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            llm,
            compiler,
            templates_dir,
            output_dir,
        }
    }

    async fn load_template(&self, template_id: &str) -> Result<String, GenerationError> {
        if !is_safe_id(template_id) {
            return Err(GenerationError::InvalidId(template_id.to_string()));
        }
        let path = self.templates_dir.join(format!("{template_id}.tex"));
        match tokio::fs::read_to_string(&path).await {
            Ok(t) => Ok(t),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(GenerationError::TemplateNotFound(template_id.to_string()))
            }
            Err(e) => Err(GenerationError::Io(e)),
        }
    }
}

#[async_trait]
impl DocumentGenerator for LlmDocumentGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
        feedback: Option<&str>,
        session_id: Option<&str>,
    ) -> Result<GeneratedArtifact, GenerationError> {
        let session_id = match session_id {
            Some(id) if is_safe_id(id) => id.to_string(),
            Some(id) => return Err(GenerationError::InvalidId(id.to_string())),
            None => new_session_id(),
        };

        let template = self.load_template(&request.template_id).await?;

        let prompt = build_generation_prompt(
            &serde_json::to_string_pretty(&request.profile)?,
            &serde_json::to_string_pretty(&request.experiences)?,
            &template,
            feedback,
        );

        info!(
            session_id,
            template = %request.template_id,
            with_feedback = feedback.is_some(),
            "Generating document"
        );
        let source = self.llm.complete(&prompt, &generation_system()).await?;

        let session_dir = self.output_dir.join(&session_id);
        tokio::fs::create_dir_all(&session_dir).await?;
        let source_path = session_dir.join(format!("{session_id}.tex"));
        tokio::fs::write(&source_path, source).await?;

        // Second pass resolves cross-references.
        let first = self.compiler.compile(&source_path, &session_dir).await?;
        let second = self.compiler.compile(&source_path, &session_dir).await?;
        if !second.exit_ok {
            warn!(session_id, "Compiler exited with errors; keeping produced document");
        }

        remove_aux_files(&session_dir, &session_id).await;

        let artifact_path = match second.artifact_path.or(first.artifact_path) {
            Some(path) => path,
            None => {
                warn!(session_id, "Compiler produced no document; leaving it to validation");
                session_artifact_path(&self.output_dir, &session_id)
            }
        };

        Ok(GeneratedArtifact {
            session_id,
            artifact_path,
            source_path,
        })
    }
}

async fn remove_aux_files(dir: &Path, stem: &str) {
    for ext in AUX_EXTENSIONS {
        let path = dir.join(format!("{stem}.{ext}"));
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!(path = %path.display(), "Removed compiler by-product"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), "Failed to remove compiler by-product: {e}"),
        }
    }
}
