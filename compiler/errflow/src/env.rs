//! Call summary lookup shared by the summarizer and the checker.

use std::borrow::Cow;

use errflow_facts::{DispatchKey, DispatchStore, FunctionSummary};
use errflow_ir::{Callee, FuncRef, TypeRef};

use crate::scope::UnitScope;
use crate::summarize::UnitSummaries;

/// Where summaries of abstract methods come from.
///
/// The summarizer reads local aggregation merged with the global store; the
/// checker reads the global store and records what it could not find.
pub trait DispatchSource {
    /// The aggregated summary of `key`, or `None` when no implementation is
    /// known.
    fn dispatch_summary(&self, key: &DispatchKey) -> Option<FunctionSummary>;
}

impl DispatchSource for DispatchStore {
    fn dispatch_summary(&self, key: &DispatchKey) -> Option<FunctionSummary> {
        self.get(key)
    }
}

/// Everything needed to answer "what can this call produce".
#[derive(Clone, Copy)]
pub struct Env<'s> {
    pub scope: &'s UnitScope<'s>,
    /// Current knowledge about the unit's own functions.
    pub summaries: &'s UnitSummaries,
    pub dispatch: &'s dyn DispatchSource,
}

impl<'s> Env<'s> {
    /// Summary of a function or concrete method: the unit's own map for
    /// local functions, imported facts otherwise.
    pub fn function_summary(&self, func: &FuncRef) -> Option<&'s FunctionSummary> {
        let scope = self.scope;
        if func.unit == scope.path() {
            self.summaries.get(func)
        } else {
            scope.imported_summary(func)
        }
    }

    pub fn dispatch_summary(&self, iface: &TypeRef, method: &str) -> Option<FunctionSummary> {
        self.dispatch
            .dispatch_summary(&DispatchKey::new(iface, method))
    }

    /// Summary of a statically known or dispatched callee. Function-typed
    /// locals and builtins have none.
    pub fn call_summary(&self, callee: &Callee) -> Option<Cow<'s, FunctionSummary>> {
        match callee {
            Callee::Static(func) => self.function_summary(func).map(Cow::Borrowed),
            Callee::Dynamic { iface, method } => {
                self.dispatch_summary(iface, method).map(Cow::Owned)
            }
            Callee::Local(_) | Callee::Builtin(_) => None,
        }
    }
}
