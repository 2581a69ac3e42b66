//! Error types and diagnostic reporting

use codespan_reporting::diagnostic::{Diagnostic as Report, Label};
use codespan_reporting::files::{Files, SimpleFiles};
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream, WriteColor};
use std::ops::Range;
use thiserror::Error;

use super::Position;
use crate::sema::{Diagnostic, Severity};

/// Fatal errors that abort a run
///
/// Recoverable problems in the analyzed program are never reported through
/// this type; they are collected as [`Diagnostic`]s instead.
#[derive(Error, Debug)]
pub enum SemaError {
    #[error("malformed input: {message}")]
    MalformedInput { message: String },

    #[error("internal invariant violated: {message}")]
    InternalInvariantViolation { message: String },

    #[error("analysis already completed")]
    AlreadyCompleted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SemaError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedInput {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalInvariantViolation {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for SemaError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            Self::Io(err.into())
        } else {
            Self::malformed(err.to_string())
        }
    }
}

pub type SemaResult<T> = Result<T, SemaError>;

/// Where a diagnostic should be rendered against
#[derive(Debug, Clone, Copy)]
pub enum SourceRef<'a> {
    /// Source text registered with [`DiagnosticReporter::add_file`]
    File(usize),
    /// Only the input path is known; positions are printed inline
    Path(&'a str),
}

/// Diagnostic reporter for pretty error output
pub struct DiagnosticReporter {
    files: SimpleFiles<String, String>,
    writer: StandardStream,
    config: term::Config,
}

impl DiagnosticReporter {
    pub fn new() -> Self {
        Self::with_color(ColorChoice::Auto)
    }

    pub fn with_color(choice: ColorChoice) -> Self {
        Self {
            files: SimpleFiles::new(),
            writer: StandardStream::stderr(choice),
            config: term::Config::default(),
        }
    }

    pub fn add_file(&mut self, name: impl Into<String>, source: impl Into<String>) -> usize {
        self.files.add(name.into(), source.into())
    }

    /// Print a diagnostic to stderr
    pub fn report(&self, source: SourceRef<'_>, diagnostic: &Diagnostic) {
        let _ = self.emit_to(&mut self.writer.lock(), source, diagnostic);
    }

    /// Print a fatal error to stderr
    pub fn report_error(&self, path: &str, error: &SemaError) {
        let report = match error {
            SemaError::MalformedInput { message } => {
                Report::error().with_message(format!("{path}: malformed AST input: {message}"))
            }
            SemaError::InternalInvariantViolation { message } => Report::bug()
                .with_message(format!("{path}: internal invariant violated: {message}")),
            SemaError::AlreadyCompleted => {
                Report::bug().with_message(format!("{path}: analysis already completed"))
            }
            SemaError::Io(err) => Report::error().with_message(format!("{path}: IO error: {err}")),
        };

        let _ = term::emit(&mut self.writer.lock(), &self.config, &self.files, &report);
    }

    /// Render a diagnostic into any color-aware writer
    pub fn emit_to(
        &self,
        writer: &mut dyn WriteColor,
        source: SourceRef<'_>,
        diagnostic: &Diagnostic,
    ) -> Result<(), codespan_reporting::files::Error> {
        let report = match source {
            SourceRef::File(file_id) => self
                .labelled(file_id, diagnostic)
                .unwrap_or_else(|| Self::inline(&self.name_of(file_id), diagnostic)),
            SourceRef::Path(path) => Self::inline(path, diagnostic),
        };
        term::emit(writer, &self.config, &self.files, &report)
    }

    fn name_of(&self, file_id: usize) -> String {
        self.files
            .get(file_id)
            .map(|file| file.name().clone())
            .unwrap_or_default()
    }

    fn base(diagnostic: &Diagnostic) -> Report<usize> {
        let report = match diagnostic.severity {
            Severity::Error => Report::error(),
            Severity::Warning => Report::warning(),
        };
        report.with_code(diagnostic.kind.code())
    }

    /// Snippet rendering; `None` when a position falls outside the file
    fn labelled(&self, file_id: usize, diagnostic: &Diagnostic) -> Option<Report<usize>> {
        let mut labels = vec![
            Label::primary(file_id, self.byte_range(file_id, diagnostic.position)?)
                .with_message(&diagnostic.message),
        ];
        if let Some(related) = &diagnostic.related {
            labels.push(
                Label::secondary(file_id, self.byte_range(file_id, related.position)?)
                    .with_message(&related.message),
            );
        }

        Some(
            Self::base(diagnostic)
                .with_message(diagnostic.kind.title())
                .with_labels(labels),
        )
    }

    fn inline(path: &str, diagnostic: &Diagnostic) -> Report<usize> {
        let mut report = Self::base(diagnostic).with_message(format!(
            "{path}:{}: {}",
            diagnostic.position, diagnostic.message
        ));
        if let Some(related) = &diagnostic.related {
            report = report.with_notes(vec![format!(
                "{path}:{}: {}",
                related.position, related.message
            )]);
        }
        report
    }

    fn byte_range(&self, file_id: usize, position: Position) -> Option<Range<usize>> {
        let line_index = (position.line as usize).checked_sub(1)?;
        let line = self.files.line_range(file_id, line_index).ok()?;
        let start = (line.start + (position.column as usize).saturating_sub(1)).min(line.end);
        let end = (start + 1).min(line.end);
        Some(start..end)
    }
}

impl Default for DiagnosticReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sema::{DiagnosticKind, RelatedInfo};
    use codespan_reporting::term::termcolor::Buffer;

    fn render(reporter: &DiagnosticReporter, source: SourceRef<'_>, diagnostic: &Diagnostic) -> String {
        let mut buffer = Buffer::no_color();
        reporter.emit_to(&mut buffer, source, diagnostic).unwrap();
        String::from_utf8(buffer.into_inner()).unwrap()
    }

    fn duplicate() -> Diagnostic {
        Diagnostic::error(
            DiagnosticKind::DuplicateDeclaration,
            "'x' is already declared in this scope",
            Position::new(2, 5),
        )
        .with_related("previously declared here", Position::new(1, 5))
    }

    #[test]
    fn test_inline_rendering_without_source() {
        let reporter = DiagnosticReporter::new();
        let out = render(&reporter, SourceRef::Path("main.ast.json"), &duplicate());

        assert!(out.contains("error[E0001]"));
        assert!(out.contains("main.ast.json:2:5: 'x' is already declared in this scope"));
        assert!(out.contains("main.ast.json:1:5: previously declared here"));
    }

    #[test]
    fn test_snippet_rendering_with_source() {
        let mut reporter = DiagnosticReporter::new();
        let file_id = reporter.add_file("main.src", "let x = 1;\nlet x = 2;\n");
        let out = render(&reporter, SourceRef::File(file_id), &duplicate());

        assert!(out.contains("duplicate declaration"));
        assert!(out.contains("main.src:2:5"));
        assert!(out.contains("let x = 2;"));
        assert!(out.contains("previously declared here"));
    }

    #[test]
    fn test_out_of_range_position_falls_back_to_inline() {
        let mut reporter = DiagnosticReporter::new();
        let file_id = reporter.add_file("short.src", "x\n");
        let diagnostic = Diagnostic::warning(
            DiagnosticKind::UnusedVariable,
            "unused variable 'y'",
            Position::new(40, 1),
        );
        let out = render(&reporter, SourceRef::File(file_id), &diagnostic);

        assert!(out.contains("warning[W0001]"));
        assert!(out.contains("short.src:40:1: unused variable 'y'"));
    }

    #[test]
    fn test_related_info_is_kept() {
        let diagnostic = duplicate();
        assert_eq!(
            diagnostic.related,
            Some(RelatedInfo {
                message: "previously declared here".to_string(),
                position: Position::new(1, 5),
            })
        );
    }

    #[test]
    fn test_serde_error_maps_to_malformed_input() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(matches!(SemaError::from(err), SemaError::MalformedInput { .. }));
    }
}
