//! Semantic analysis
//!
//! The analyzer walks a [`Program`](crate::ast::Program) once, building
//! scoped symbol tables and assigning a static type to every expression.
//! Recoverable problems are collected as [`Diagnostic`]s so a single run
//! reports all of them.

mod analyzer;
mod diagnostics;
mod scope;
mod types;

pub use analyzer::{Analysis, Analyzer, AnalyzerState, ResolutionTable, TypeTable};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, RelatedInfo, Severity};
pub use scope::{ScopeError, ScopeHandle, Symbol, SymbolId, SymbolKind, SymbolTable};
pub use types::{FunctionType, PrimitiveType, Type, TypeChecker};

/// Configuration options passed to the analyzer
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Warn about variables and parameters that are never read
    pub warn_unused: bool,
    /// Deepest statement/expression nesting accepted before giving up
    pub max_depth: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            warn_unused: true,
            max_depth: 512,
        }
    }
}
