//! Common infrastructure shared by the loader, the analyzer and the CLI

mod error;
mod position;
mod stack;

pub use error::{DiagnosticReporter, SemaError, SemaResult, SourceRef};
pub use position::Position;
pub use stack::with_stack;
