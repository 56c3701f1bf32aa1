//! Diagnostic queue for collecting, deduplicating, and sorting diagnostics.
//!
//! Deduplication is keyed by the caller, not by message text: the checker
//! keys each report by the obligation's origin and the identity, so a
//! function re-checked after deferral cannot report the same thing twice.

use rustc_hash::FxHashSet;

use errflow_ir::Span;

use crate::Diagnostic;

/// Identity of a report for deduplication: `(unit, origin, discriminator)`.
pub type DedupKey = (String, Span, String);

/// Queue for collecting, deduplicating, and sorting diagnostics.
#[derive(Clone, Debug, Default)]
pub struct DiagnosticQueue {
    diagnostics: Vec<Diagnostic>,
    seen: FxHashSet<DedupKey>,
}

impl DiagnosticQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a diagnostic unless a diagnostic with the same key was added
    /// before. Returns `true` if it was added.
    pub fn push(&mut self, key: DedupKey, diag: Diagnostic) -> bool {
        if !self.seen.insert(key) {
            return false;
        }
        self.diagnostics.push(diag);
        true
    }

    /// Whether a report with this key has been accepted already.
    pub fn contains(&self, key: &DedupKey) -> bool {
        self.seen.contains(key)
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Sort diagnostics by unit, position and message and return them.
    ///
    /// Clears the pending list. Dedup keys are kept, so a later push of an
    /// already-flushed report is still rejected.
    pub fn flush(&mut self) -> Vec<Diagnostic> {
        let mut result: Vec<Diagnostic> = self.diagnostics.drain(..).collect();
        result.sort_by(|a, b| {
            (&a.unit, a.span, &a.message).cmp(&(&b.unit, b.span, &b.message))
        });
        result
    }
}

#[cfg(test)]
mod tests;
