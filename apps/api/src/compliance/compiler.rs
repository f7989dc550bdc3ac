//! External document compiler (LaTeX → PDF).

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Compiler binary '{0}' not found")]
    MissingBinary(String),

    #[error("Compiler timed out after {0:?}")]
    Timeout(Duration),

    #[error("Compiler I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of one compiler run. A non-zero exit is reported, not raised.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    pub exit_ok: bool,
    /// The compiler's log file, or its captured stdout/stderr when no log was written.
    pub log: String,
    /// Set when the compiler produced an artifact, whatever its exit status.
    pub artifact_path: Option<PathBuf>,
}

impl CompileOutput {
    pub fn page_count(&self) -> u32 {
        parse_page_count(&self.log)
    }
}

#[async_trait]
pub trait DocumentCompiler: Send + Sync {
    /// Compiles `source`, writing outputs into `out_dir`.
    async fn compile(&self, source: &Path, out_dir: &Path) -> Result<CompileOutput, CompileError>;
}

/// `pdflatex -interaction=nonstopmode`, bounded by a timeout. The child is
/// killed if the timeout fires.
pub struct PdfLatexCompiler {
    binary: String,
    timeout: Duration,
}

impl PdfLatexCompiler {
    pub fn new(binary: String, timeout: Duration) -> Self {
        Self { binary, timeout }
    }
}

#[async_trait]
impl DocumentCompiler for PdfLatexCompiler {
    async fn compile(&self, source: &Path, out_dir: &Path) -> Result<CompileOutput, CompileError> {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let log_path = out_dir.join(format!("{stem}.log"));

        // A log left by an earlier run must not be mistaken for this one's.
        let _ = tokio::fs::remove_file(&log_path).await;

        let mut command = Command::new(&self.binary);
        command
            .arg("-interaction=nonstopmode")
            .arg(format!("-output-directory={}", out_dir.display()))
            .arg(source)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Err(_) => return Err(CompileError::Timeout(self.timeout)),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CompileError::MissingBinary(self.binary.clone()))
            }
            Ok(Err(e)) => return Err(CompileError::Io(e)),
            Ok(Ok(output)) => output,
        };

        let log = match tokio::fs::read(&log_path).await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(_) => format!(
                "{}{}",
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            ),
        };

        let pdf = out_dir.join(format!("{stem}.pdf"));
        let artifact_path = tokio::fs::try_exists(&pdf)
            .await
            .unwrap_or(false)
            .then_some(pdf);

        debug!(
            source = %source.display(),
            status = ?output.status.code(),
            artifact = artifact_path.is_some(),
            "Compiler finished"
        );

        Ok(CompileOutput {
            exit_ok: output.status.success(),
            log,
            artifact_path,
        })
    }
}

fn page_marker() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| {
        Regex::new(r"(?s)Output written on .*? \((\d+) pages?").expect("page marker regex is valid")
    })
}

/// Reads `N` from the compiler's `Output written on <file> (N pages, ...)` line.
/// The log wraps long paths, so the file name may span lines.
/// Returns 0 when the marker is absent.
pub fn parse_page_count(log: &str) -> u32 {
    page_marker()
        .captures(log)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_page_count_plural_and_singular() {
        let two = "Transcript written on cv.log.\nOutput written on /tmp/s/cv.pdf (2 pages, 51234 bytes).\n";
        assert_eq!(parse_page_count(two), 2);

        let one = "Output written on cv.pdf (1 page, 40120 bytes).";
        assert_eq!(parse_page_count(one), 1);

        let wrapped = "Output written on /var/lib/rezume/outputs/generated_cvs/rezume_llm_0f3c/rezume_l\nlm_0f3c.pdf (1 page, 38211 bytes).";
        assert_eq!(parse_page_count(wrapped), 1);
    }

    #[test]
    fn test_parse_page_count_missing_marker_is_zero() {
        assert_eq!(parse_page_count("! LaTeX Error: File `x.sty' not found."), 0);
        assert_eq!(parse_page_count(""), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hung_compiler_times_out() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("cv.tex");
        std::fs::write(&source, "x").unwrap();

        // Accepts pdflatex's arguments and never finishes.
        let hang = dir.path().join("hang.sh");
        std::fs::write(&hang, "#!/bin/sh\nexec sleep 30\n").unwrap();
        std::fs::set_permissions(&hang, std::fs::Permissions::from_mode(0o755)).unwrap();

        let compiler = PdfLatexCompiler::new(
            hang.display().to_string(),
            Duration::from_secs(1),
        );
        let started = std::time::Instant::now();
        let err = compiler.compile(&source, dir.path()).await.unwrap_err();

        assert!(matches!(err, CompileError::Timeout(d) if d == Duration::from_secs(1)));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_missing_binary_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("cv.tex");
        std::fs::write(&source, "x").unwrap();

        let compiler = PdfLatexCompiler::new(
            "definitely-not-a-real-compiler-binary".to_string(),
            Duration::from_secs(5),
        );
        let err = compiler.compile(&source, dir.path()).await.unwrap_err();
        assert!(matches!(err, CompileError::MissingBinary(_)));
    }
}
