use std::fmt;

use errflow_ir::Span;

/// A diagnostic attached to a position in one compilation unit.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Diagnostic {
    /// Path of the unit the span points into.
    pub unit: String,
    pub span: Span,
    pub message: String,
}

impl Diagnostic {
    pub fn new(unit: impl Into<String>, span: Span, message: impl Into<String>) -> Self {
        Diagnostic {
            unit: unit.into(),
            span,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.unit, self.span, self.message)
    }
}
