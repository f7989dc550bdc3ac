//! Generate → validate → retry loop.
//!
//! ```text
//! GENERATING → VALIDATING ─┬─ valid ─────────────────────────→ DONE
//!      ↑                   ├─ invalid, retries left → RETRYING ─┐
//!      └───────────────────┼────────────────────────────────────┘
//!                          └─ invalid, retries spent ─────────→ DONE_WITH_WARNINGS
//! ```
//!
//! Attempts are strictly sequential and share one session directory.
//! Non-compliance never fails the run; only a generator error does.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::compliance::{ComplianceValidator, ValidationReport};
use crate::generation::generator::{
    DocumentGenerator, GeneratedArtifact, GenerationError, GenerationRequest,
};
use crate::generation::prompts::build_feedback;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationState {
    Generating,
    Validating,
    Retrying,
    Done,
    DoneWithWarnings,
}

impl GenerationState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::DoneWithWarnings)
    }
}

/// State of one generate-validate-retry run.
#[derive(Debug, Clone)]
pub struct GenerationSession {
    pub session_id: Option<String>,
    pub attempts: u32,
    pub state: GenerationState,
    /// Every state entered, in order, starting with `Generating`.
    pub history: Vec<GenerationState>,
    pub last_artifact: Option<GeneratedArtifact>,
    pub last_report: Option<ValidationReport>,
}

impl GenerationSession {
    fn new() -> Self {
        Self {
            session_id: None,
            attempts: 0,
            state: GenerationState::Generating,
            history: vec![GenerationState::Generating],
            last_artifact: None,
            last_report: None,
        }
    }

    fn transition(&mut self, next: GenerationState) {
        debug_assert!(!self.state.is_terminal(), "terminal states have no successors");
        debug!(from = ?self.state, to = ?next, attempt = self.attempts, "Generation state change");
        self.state = next;
        self.history.push(next);
    }
}

/// Terminal result of a run.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationOutcome {
    pub session_id: String,
    pub status: GenerationState,
    pub attempts: u32,
    pub artifact: GeneratedArtifact,
    pub report: ValidationReport,
    #[serde(skip)]
    pub history: Vec<GenerationState>,
}

pub struct GenerationController {
    generator: Arc<dyn DocumentGenerator>,
    validator: Arc<ComplianceValidator>,
    max_retries: u32,
}

impl GenerationController {
    pub fn new(
        generator: Arc<dyn DocumentGenerator>,
        validator: Arc<ComplianceValidator>,
        max_retries: u32,
    ) -> Self {
        Self {
            generator,
            validator,
            max_retries,
        }
    }

    /// Runs up to `1 + max_retries` attempts. Returns the last artifact and its
    /// report, compliant or not.
    pub async fn run(
        &self,
        request: &GenerationRequest,
        target_company: Option<&str>,
    ) -> Result<GenerationOutcome, GenerationError> {
        let mut session = GenerationSession::new();
        let mut feedback: Option<String> = None;

        let (artifact, report) = loop {
            session.attempts += 1;
            info!(
                attempt = session.attempts,
                max_attempts = self.max_retries + 1,
                "Generation attempt"
            );

            let artifact = self
                .generator
                .generate(request, feedback.as_deref(), session.session_id.as_deref())
                .await?;
            session.session_id = Some(artifact.session_id.clone());

            session.transition(GenerationState::Validating);
            let report = self
                .validator
                .validate(&artifact.source_path, target_company)
                .await;
            session.last_artifact = Some(artifact.clone());
            session.last_report = Some(report.clone());

            if report.valid {
                info!(session_id = %artifact.session_id, attempt = session.attempts, "Document passed validation");
                session.transition(GenerationState::Done);
                break (artifact, report);
            }

            if session.attempts > self.max_retries {
                warn!(
                    session_id = %artifact.session_id,
                    attempts = session.attempts,
                    warnings = ?report.warnings,
                    "Retries exhausted; returning non-compliant document"
                );
                session.transition(GenerationState::DoneWithWarnings);
                break (artifact, report);
            }

            let issues: Vec<String> = report
                .warnings
                .iter()
                .chain(report.errors.iter())
                .cloned()
                .collect();
            warn!(
                session_id = %artifact.session_id,
                attempt = session.attempts,
                issues = issues.len(),
                "Document failed validation; retrying with feedback"
            );
            feedback = Some(build_feedback(&issues));

            session.transition(GenerationState::Retrying);
            session.transition(GenerationState::Generating);
        };

        Ok(GenerationOutcome {
            session_id: artifact.session_id.clone(),
            status: session.state,
            attempts: session.attempts,
            artifact,
            report,
            history: session.history,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compliance::test_support::StubCompiler;
    use crate::models::Profile;
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    /// Writes a fixed source into one session directory and records each call.
    struct StubGenerator {
        root: PathBuf,
        source: String,
        calls: Mutex<Vec<(Option<String>, Option<String>)>>,
    }

    impl StubGenerator {
        fn new(root: &Path, source: &str) -> Self {
            Self {
                root: root.to_path_buf(),
                source: source.to_string(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl DocumentGenerator for StubGenerator {
        async fn generate(
            &self,
            _request: &GenerationRequest,
            feedback: Option<&str>,
            session_id: Option<&str>,
        ) -> Result<GeneratedArtifact, GenerationError> {
            let mut calls = self.calls.lock().unwrap();
            calls.push((feedback.map(String::from), session_id.map(String::from)));
            let id = session_id
                .map(String::from)
                .unwrap_or_else(|| format!("session_{}", calls.len()));

            let dir = self.root.join(&id);
            std::fs::create_dir_all(&dir)?;
            let source_path = dir.join(format!("{id}.tex"));
            std::fs::write(&source_path, &self.source)?;
            Ok(GeneratedArtifact {
                artifact_path: dir.join(format!("{id}.pdf")),
                source_path,
                session_id: id,
            })
        }
    }

    struct BrokenGenerator;

    #[async_trait]
    impl DocumentGenerator for BrokenGenerator {
        async fn generate(
            &self,
            _request: &GenerationRequest,
            _feedback: Option<&str>,
            _session_id: Option<&str>,
        ) -> Result<GeneratedArtifact, GenerationError> {
            Err(GenerationError::Compile(
                crate::compliance::CompileError::MissingBinary("pdflatex".to_string()),
            ))
        }
    }

    const CLEAN: &str = "\\documentclass{article}\\begin{document}Ada\\end{document}";

    fn request() -> GenerationRequest {
        GenerationRequest {
            profile: Profile::default(),
            experiences: vec![],
            template_id: "classic".to_string(),
        }
    }

    fn controller(
        generator: Arc<dyn DocumentGenerator>,
        compiler: StubCompiler,
    ) -> GenerationController {
        GenerationController::new(
            generator,
            Arc::new(ComplianceValidator::new(Arc::new(compiler))),
            2,
        )
    }

    #[tokio::test]
    async fn test_always_invalid_stops_after_three_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let generator = Arc::new(StubGenerator::new(dir.path(), CLEAN));
        let outcome = controller(generator.clone(), StubCompiler::fixed(2))
            .run(&request(), None)
            .await
            .unwrap();

        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.status, GenerationState::DoneWithWarnings);
        assert!(!outcome.report.valid);
        assert_eq!(outcome.report.page_count, 2);
        assert_eq!(generator.calls.lock().unwrap().len(), 3);
        assert_eq!(
            outcome.history,
            vec![
                GenerationState::Generating,
                GenerationState::Validating,
                GenerationState::Retrying,
                GenerationState::Generating,
                GenerationState::Validating,
                GenerationState::Retrying,
                GenerationState::Generating,
                GenerationState::Validating,
                GenerationState::DoneWithWarnings,
            ]
        );
    }

    #[tokio::test]
    async fn test_retries_reuse_session_and_carry_feedback() {
        let dir = tempfile::tempdir().unwrap();
        let generator = Arc::new(StubGenerator::new(dir.path(), CLEAN));
        let outcome = controller(generator.clone(), StubCompiler::fixed(2))
            .run(&request(), None)
            .await
            .unwrap();

        let calls = generator.calls.lock().unwrap();
        assert_eq!(calls[0], (None, None));
        for (feedback, session) in calls.iter().skip(1) {
            assert_eq!(session.as_deref(), Some(outcome.session_id.as_str()));
            let feedback = feedback.as_deref().unwrap();
            assert!(feedback.contains("Page count violation: 2 pages (limit: 1)"));
        }
        // One session directory for all attempts.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_valid_first_attempt_is_done() {
        let dir = tempfile::tempdir().unwrap();
        let generator = Arc::new(StubGenerator::new(dir.path(), CLEAN));
        let outcome = controller(generator, StubCompiler::fixed(1))
            .run(&request(), None)
            .await
            .unwrap();

        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.status, GenerationState::Done);
        assert!(outcome.report.valid);
        assert!(outcome.status.is_terminal());
    }

    #[tokio::test]
    async fn test_recovers_on_second_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let generator = Arc::new(StubGenerator::new(dir.path(), CLEAN));
        let outcome = controller(generator, StubCompiler::sequence(vec![2, 1]))
            .run(&request(), None)
            .await
            .unwrap();

        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.status, GenerationState::Done);
    }

    #[tokio::test]
    async fn test_content_warnings_drive_retries() {
        let dir = tempfile::tempdir().unwrap();
        let generator = Arc::new(StubGenerator::new(dir.path(), &format!("{CLEAN} Acme Corp")));
        let outcome = controller(generator, StubCompiler::fixed(1))
            .run(&request(), Some("Acme Corp"))
            .await
            .unwrap();

        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.status, GenerationState::DoneWithWarnings);
        assert_eq!(outcome.report.page_count, 1);
    }

    #[tokio::test]
    async fn test_generator_failure_propagates() {
        let result = controller(Arc::new(BrokenGenerator), StubCompiler::fixed(1))
            .run(&request(), None)
            .await;
        assert!(matches!(result, Err(GenerationError::Compile(_))));
    }

    #[tokio::test]
    async fn test_draft_without_pdf_is_retried() {
        use crate::generation::generator::LlmDocumentGenerator;
        use crate::llm_client::{LlmError, TextCompleter};

        struct FixedLlm(Mutex<Vec<String>>);

        #[async_trait]
        impl TextCompleter for FixedLlm {
            async fn complete(&self, prompt: &str, _system: &str) -> Result<String, LlmError> {
                self.0.lock().unwrap().push(prompt.to_string());
                Ok(CLEAN.to_string())
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let templates = dir.path().join("templates");
        std::fs::create_dir_all(&templates).unwrap();
        std::fs::write(templates.join("classic.tex"), "\\documentclass{article}").unwrap();

        // Attempt 1: both renders and the check fail; attempt 2 renders one page.
        let compiler = Arc::new(StubCompiler::sequence(vec![0, 0, 0, 1]));
        let llm = Arc::new(FixedLlm(Mutex::new(Vec::new())));
        let generator = Arc::new(LlmDocumentGenerator::new(
            llm.clone(),
            compiler.clone(),
            templates,
            dir.path().join("out"),
        ));
        let controller =
            GenerationController::new(generator, Arc::new(ComplianceValidator::new(compiler)), 2);

        let outcome = controller.run(&request(), None).await.unwrap();

        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.status, GenerationState::Done);
        assert!(outcome.artifact.artifact_path.exists());
        let prompts = llm.0.lock().unwrap();
        assert!(prompts[1].contains("Compilation failed or page count could not be determined."));
    }

    #[tokio::test]
    async fn test_zero_retries_means_single_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let generator = Arc::new(StubGenerator::new(dir.path(), CLEAN));
        let controller = GenerationController::new(
            generator,
            Arc::new(ComplianceValidator::new(Arc::new(StubCompiler::fixed(2)))),
            0,
        );
        let outcome = controller.run(&request(), None).await.unwrap();
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.status, GenerationState::DoneWithWarnings);
    }
}
