//! Diagnostics for the errflow analysis.
//!
//! The analysis emits exactly one kind of diagnostic: an error identity
//! that reached the end of its binding without being discriminated or
//! propagated. Every diagnostic is advisory; none aborts the analysis.

mod diagnostic;
pub mod queue;

pub use diagnostic::Diagnostic;
pub use queue::{DedupKey, DiagnosticQueue};
