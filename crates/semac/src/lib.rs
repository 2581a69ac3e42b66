//! semac - semantic analyzer for JSON-serialized syntax trees
//!
//! Takes the AST of a small statically-typed imperative language (as
//! produced by an external parser), resolves every name against its
//! lexical scope, type-checks every expression and statement, and reports
//! all recoverable problems as positioned diagnostics in one pass.
//!
//! ## Architecture
//!
//! The analyzer is organized into:
//! - **AST** (`ast/`): Typed tree, JSON loading, in-memory builder
//! - **Sema** (`sema/`): Symbol table, type system, diagnostics, analyzer
//! - **Driver** (`driver/`): Per-file sessions, parallel over many inputs
//! - **Common** (`common/`): Shared infrastructure (errors, positions, reporting)

pub mod ast;
pub mod common;
pub mod driver;
pub mod sema;

// Re-exports for convenience
pub use common::{DiagnosticReporter, Position, SemaError, SemaResult, SourceRef};
pub use driver::{Session, SessionConfig, SessionStatus, UnitResult};
pub use sema::{Analysis, Analyzer, AnalyzerConfig, Diagnostic, DiagnosticKind, Severity};
