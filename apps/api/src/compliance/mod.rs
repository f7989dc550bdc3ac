// Compliance checks for generated documents: compile, count pages, apply
// content rules. The compiler is a trait so tests never need a TeX install.

pub mod compiler;
pub mod rules;
pub mod validator;

pub use compiler::{CompileError, DocumentCompiler, PdfLatexCompiler};
pub use validator::{ComplianceValidator, ValidationReport};
