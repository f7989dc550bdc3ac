use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::compiler::DocumentCompiler;
use super::rules::check_content_rules;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub page_count: u32,
    pub page_status: PageStatus,
    pub warnings: Vec<String>,
    /// Conditions that prevented validation from running at all.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn file_not_found() -> Self {
        Self {
            valid: false,
            page_count: 0,
            page_status: PageStatus::Error,
            warnings: Vec::new(),
            errors: vec!["File not found".to_string()],
        }
    }
}

/// Compiles a generated source and checks it against the compliance rules:
/// exactly one page, no placeholders, no target-company mention, no empty lists.
pub struct ComplianceValidator {
    compiler: Arc<dyn DocumentCompiler>,
}

impl ComplianceValidator {
    pub fn new(compiler: Arc<dyn DocumentCompiler>) -> Self {
        Self { compiler }
    }

    /// Never fails. Compiler problems show up as a zero page count.
    pub async fn validate(&self, source: &Path, target_company: Option<&str>) -> ValidationReport {
        let bytes = match tokio::fs::read(source).await {
            Ok(b) => b,
            Err(_) => return ValidationReport::file_not_found(),
        };
        let text = String::from_utf8_lossy(&bytes);

        let mut warnings = check_content_rules(&text, target_company);

        let out_dir = source.parent().unwrap_or_else(|| Path::new("."));
        let page_count = match self.compiler.compile(source, out_dir).await {
            Ok(output) => output.page_count(),
            Err(e) => {
                warn!(source = %source.display(), "Validation compile failed: {e}");
                0
            }
        };

        let page_status = match page_count {
            1 => PageStatus::Ok,
            0 => {
                warnings.push(
                    "Compilation failed or page count could not be determined.".to_string(),
                );
                PageStatus::Error
            }
            n => {
                warnings.push(format!("Page count violation: {n} pages (limit: 1)"));
                PageStatus::Error
            }
        };

        let valid = warnings.is_empty() && page_count == 1;
        info!(
            source = %source.display(),
            valid,
            page_count,
            warnings = warnings.len(),
            "Compliance check complete"
        );

        ValidationReport {
            valid,
            page_count,
            page_status,
            warnings,
            errors: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compliance::test_support::StubCompiler;

    const CLEAN: &str = "\\documentclass{article}\\begin{document}Senior Engineer at Tech Corp\\end{document}";

    fn write_source(dir: &Path, body: &str) -> std::path::PathBuf {
        let path = dir.join("cv.tex");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[tokio::test]
    async fn test_two_page_document_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(dir.path(), CLEAN);
        let validator = ComplianceValidator::new(Arc::new(StubCompiler::fixed(2)));

        let report = validator.validate(&source, None).await;
        assert_eq!(report.page_count, 2);
        assert!(!report.valid);
        assert_eq!(report.page_status, PageStatus::Error);
        assert_eq!(report.warnings, vec!["Page count violation: 2 pages (limit: 1)".to_string()]);
    }

    #[tokio::test]
    async fn test_clean_one_page_document_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(dir.path(), CLEAN);
        let validator = ComplianceValidator::new(Arc::new(StubCompiler::fixed(1)));

        let report = validator.validate(&source, Some("Acme")).await;
        assert!(report.valid);
        assert_eq!(report.page_count, 1);
        assert_eq!(report.page_status, PageStatus::Ok);
        assert!(report.warnings.is_empty());
        assert!(report.errors.is_empty());
    }

    #[tokio::test]
    async fn test_one_page_with_placeholder_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(dir.path(), &format!("{CLEAN} [company]"));
        let validator = ComplianceValidator::new(Arc::new(StubCompiler::fixed(1)));

        let report = validator.validate(&source, None).await;
        assert!(!report.valid);
        assert_eq!(report.page_status, PageStatus::Ok);
        assert_eq!(report.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_marker_counts_as_compile_failure() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(dir.path(), CLEAN);
        let validator = ComplianceValidator::new(Arc::new(StubCompiler::fixed(0)));

        let report = validator.validate(&source, None).await;
        assert!(!report.valid);
        assert_eq!(report.page_count, 0);
        assert!(report.warnings[0].contains("Compilation failed"));
    }

    #[tokio::test]
    async fn test_missing_source_file() {
        let dir = tempfile::tempdir().unwrap();
        let validator = ComplianceValidator::new(Arc::new(StubCompiler::fixed(1)));

        let report = validator.validate(&dir.path().join("nope.tex"), None).await;
        assert!(!report.valid);
        assert_eq!(report.errors, vec!["File not found".to_string()]);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["valid"], false);
        assert_eq!(json["errors"][0], "File not found");
    }
}
