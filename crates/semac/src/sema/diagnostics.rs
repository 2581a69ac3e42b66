//! Diagnostics collected during analysis

use serde::Serialize;
use std::fmt;

use crate::common::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => f.write_str("error"),
            Self::Warning => f.write_str("warning"),
        }
    }
}

/// Category of a recoverable problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DiagnosticKind {
    DuplicateDeclaration,
    UndefinedIdentifier,
    TypeMismatch,
    ArityMismatch,
    UnknownType,
    InvalidAssignmentTarget,
    AssignToImmutable,
    ReturnOutsideFunction,
    UnusedVariable,
}

impl DiagnosticKind {
    /// Stable code shown next to the severity
    pub fn code(self) -> &'static str {
        match self {
            Self::DuplicateDeclaration => "E0001",
            Self::UndefinedIdentifier => "E0002",
            Self::TypeMismatch => "E0003",
            Self::ArityMismatch => "E0004",
            Self::UnknownType => "E0005",
            Self::InvalidAssignmentTarget => "E0006",
            Self::AssignToImmutable => "E0007",
            Self::ReturnOutsideFunction => "E0008",
            Self::UnusedVariable => "W0001",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::DuplicateDeclaration => "duplicate declaration",
            Self::UndefinedIdentifier => "undefined identifier",
            Self::TypeMismatch => "mismatched types",
            Self::ArityMismatch => "wrong number of arguments",
            Self::UnknownType => "unknown type",
            Self::InvalidAssignmentTarget => "invalid assignment target",
            Self::AssignToImmutable => "assignment to immutable variable",
            Self::ReturnOutsideFunction => "return outside of function",
            Self::UnusedVariable => "unused variable",
        }
    }
}

/// Secondary location attached to a diagnostic
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelatedInfo {
    pub message: String,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
    pub position: Position,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related: Option<RelatedInfo>,
}

impl Diagnostic {
    pub fn error(kind: DiagnosticKind, message: impl Into<String>, position: Position) -> Self {
        Self {
            severity: Severity::Error,
            kind,
            message: message.into(),
            position,
            related: None,
        }
    }

    pub fn warning(kind: DiagnosticKind, message: impl Into<String>, position: Position) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(kind, message, position)
        }
    }

    pub fn with_related(mut self, message: impl Into<String>, position: Position) -> Self {
        self.related = Some(RelatedInfo {
            message: message.into(),
            position,
        });
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} {}[{}]: {}",
            self.position.line,
            self.position.column,
            self.severity,
            self.kind.code(),
            self.message
        )
    }
}

/// Append-only collection of diagnostics, kept in traversal order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        log::trace!("diagnostic: {diagnostic}");
        self.items.push(diagnostic);
    }

    pub fn error(&mut self, kind: DiagnosticKind, message: impl Into<String>, position: Position) {
        self.push(Diagnostic::error(kind, message, position));
    }

    pub fn warning(&mut self, kind: DiagnosticKind, message: impl Into<String>, position: Position) {
        self.push(Diagnostic::warning(kind, message, position));
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.items.iter().filter(|d| d.is_error()).count()
    }

    pub fn warning_count(&self) -> usize {
        self.items.len() - self.error_count()
    }

    pub fn all(&self) -> &[Diagnostic] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
