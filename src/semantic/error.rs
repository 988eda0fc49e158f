//! Errors and the shared diagnostics report.
//!
//! Two layers:
//!
//! - [`CompilerError`] is returned from operations that fail as a whole
//!   (`build_join`, `measure_by_path`, resolving a reference).
//! - [`ErrorReport`] collects every diagnostic of a compile run. Phases write
//!   into it through scoped [`ErrorReporter`]s so messages carry their
//!   context (`Orders cube -> revenue measure: ...`) and file.
//!
//! At the end of a run the report either becomes one [`CompileError`] grouped
//! by file, or is handed back to the caller as-is.

use std::fmt;

use serde::Serialize;

/// Result type for compiler operations.
pub type CompilerResult<T> = Result<T, CompilerError>;

/// Error raised by a compiler operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompilerError {
    /// The model author's fault: bad reference, missing join path, etc.
    #[error("{0}")]
    User(String),

    /// Anything else.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CompilerError {
    pub fn user(message: impl Into<String>) -> Self {
        CompilerError::User(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        CompilerError::Internal(message.into())
    }

    pub fn is_user_error(&self) -> bool {
        matches!(self, CompilerError::User(_))
    }
}

impl From<serde_json::Error> for CompilerError {
    fn from(err: serde_json::Error) -> Self {
        CompilerError::Internal(err.to_string())
    }
}

// ============================================================================
// Diagnostics
// ============================================================================

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// One reported problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,
}

impl Diagnostic {
    /// Message prefixed with its context chain.
    pub fn rendered(&self) -> String {
        if self.context.is_empty() {
            self.message.clone()
        } else {
            format!("{}: {}", self.context.join(" -> "), self.message)
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.rendered())
    }
}

/// All diagnostics of one compile run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ErrorReport {
    errors: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
}

impl ErrorReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Root reporter with no file and no context.
    pub fn reporter(&mut self) -> ErrorReporter<'_> {
        ErrorReporter {
            report: self,
            file: None,
            context: Vec::new(),
        }
    }

    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Rendered error messages.
    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(Diagnostic::rendered).collect()
    }

    /// Rendered warning messages.
    pub fn warning_messages(&self) -> Vec<String> {
        self.warnings.iter().map(Diagnostic::rendered).collect()
    }

    fn push(&mut self, diagnostic: Diagnostic) {
        let list = match diagnostic.severity {
            Severity::Error => &mut self.errors,
            Severity::Warning => &mut self.warnings,
        };
        let duplicate = list
            .iter()
            .any(|d| d.file == diagnostic.file && d.rendered() == diagnostic.rendered());
        if !duplicate {
            list.push(diagnostic);
        }
    }

    /// Fail with one [`CompileError`] if anything was reported as an error.
    pub fn throw_if_any_errors(&self) -> Result<(), CompileError> {
        if self.has_errors() {
            Err(CompileError::from_report(self))
        } else {
            Ok(())
        }
    }
}

/// A scoped view onto an [`ErrorReport`].
pub struct ErrorReporter<'a> {
    report: &'a mut ErrorReport,
    file: Option<String>,
    context: Vec<String>,
}

impl ErrorReporter<'_> {
    /// Nested reporter with one more context entry.
    pub fn in_context(&mut self, context: impl Into<String>) -> ErrorReporter<'_> {
        let mut nested = self.context.clone();
        nested.push(context.into());
        ErrorReporter {
            report: &mut *self.report,
            file: self.file.clone(),
            context: nested,
        }
    }

    /// Nested reporter attributing diagnostics to `file`.
    pub fn in_file(&mut self, file: impl Into<String>) -> ErrorReporter<'_> {
        let file = file.into();
        ErrorReporter {
            report: &mut *self.report,
            file: if file.is_empty() { None } else { Some(file) },
            context: self.context.clone(),
        }
    }

    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(file = ?self.file, context = ?self.context, %message, "compile error reported");
        self.push(Severity::Error, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(file = ?self.file, context = ?self.context, %message, "compile warning");
        self.push(Severity::Warning, message);
    }

    /// Report a failed operation as an error.
    pub fn report(&mut self, err: &CompilerError) {
        self.error(err.to_string());
    }

    fn push(&mut self, severity: Severity, message: String) {
        self.report.push(Diagnostic {
            severity,
            message,
            file: self.file.clone(),
            context: self.context.clone(),
        });
    }
}

// ============================================================================
// CompileError
// ============================================================================

const UNKNOWN_FILE: &str = "<unknown file>";

/// Aggregated failure of a compile run, grouped by file.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct CompileError {
    message: String,
    errors: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
}

impl CompileError {
    pub fn from_report(report: &ErrorReport) -> Self {
        // Files in order of first appearance.
        let mut files: Vec<&str> = Vec::new();
        for diagnostic in report.errors() {
            let file = diagnostic.file.as_deref().unwrap_or(UNKNOWN_FILE);
            if !files.contains(&file) {
                files.push(file);
            }
        }

        let mut message = String::from("Compile errors:");
        for file in files {
            message.push('\n');
            message.push_str(file);
            message.push(':');
            for diagnostic in report.errors() {
                if diagnostic.file.as_deref().unwrap_or(UNKNOWN_FILE) == file {
                    message.push_str("\n  ");
                    message.push_str(&diagnostic.rendered());
                }
            }
        }

        Self {
            message,
            errors: report.errors().to_vec(),
            warnings: report.warnings().to_vec(),
        }
    }

    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }
}
