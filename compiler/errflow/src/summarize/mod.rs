//! Error-flow summarizer: per-function summaries by fixpoint iteration.
//!
//! # Algorithm
//!
//! 1. **Initialize**: every summary starts empty.
//! 2. **Derive**: for each function, rebuild its summary from scratch using
//!    the current knowledge about its callees:
//!    - the syntax-directed return walk ([`returns`]),
//!    - the backward value-dataflow trace ([`trace`]) when the host
//!      supplied a graph,
//!    - the checked-parameter scan ([`checked`]) for functions taking
//!      errors.
//! 3. **Merge**: union the derived summary into the stored one.
//! 4. **Iterate**: repeat until a full pass changes nothing.
//!
//! Summaries only grow (every merge is a union), and the lattice is finite
//! for a given unit, so the loop terminates. Mutually recursive functions
//! converge the same way.
//!
//! Dispatch summaries seen during a pass are the unit's own aggregation,
//! rebuilt at the start of every pass, merged with the global store. What
//! the global store held for each key is kept with the summaries; once the
//! store moves past it ([`UnitSummaries::stale_keys`]) the unit has to be
//! summarized again.

mod checked;
pub(crate) mod returns;
pub(crate) mod trace;

use rustc_hash::FxHashMap;

use errflow_facts::{
    DispatchKey, DispatchStore, EntityKey, ErrorIdentity, Fact, FactError, FactStore,
    FunctionSummary,
};
use errflow_ir::{FuncRef, Function};

use crate::dispatch::{foreign_entry, DispatchReads, DispatchTable, DispatchView};
use crate::env::Env;
use crate::scope::UnitScope;

pub use trace::MAX_TRACE_DEPTH;

/// Summaries of the functions of one unit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UnitSummaries {
    functions: FxHashMap<FuncRef, FunctionSummary>,
    /// Foreign implementations seen per dispatch key.
    dispatch_reads: DispatchReads,
}

impl UnitSummaries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, func: &FuncRef) -> Option<&FunctionSummary> {
        self.functions.get(func)
    }

    /// Union `summary` into the entry of `func`; returns `true` if it grew.
    pub fn merge(&mut self, func: &FuncRef, summary: &FunctionSummary) -> bool {
        match self.functions.get_mut(func) {
            Some(existing) => existing.union(summary),
            None => {
                self.functions.insert(func.clone(), summary.clone());
                true
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FuncRef, &FunctionSummary)> {
        self.functions.iter()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Whether both hold the same function summaries.
    pub fn same_functions(&self, other: &UnitSummaries) -> bool {
        self.functions == other.functions
    }

    /// Dispatch keys read from the global store while summarizing.
    pub fn dispatch_keys(&self) -> impl Iterator<Item = &DispatchKey> {
        self.dispatch_reads.keys()
    }

    /// Keys whose foreign implementations in `store` differ from what unit
    /// `unit` was summarized against. A key nobody had published counts as
    /// soon as somebody does.
    pub fn stale_keys<'s>(
        &'s self,
        unit: &'s str,
        store: &'s DispatchStore,
    ) -> impl Iterator<Item = &'s DispatchKey> {
        self.dispatch_reads
            .iter()
            .filter(move |(key, seen)| foreign_entry(store, key, unit) != **seen)
            .map(|(key, _)| key)
    }
}

/// Run the fixpoint for every function of the unit in `scope`.
#[tracing::instrument(level = "debug", skip_all, fields(unit = %scope.path()))]
pub fn summarize_unit(scope: &UnitScope<'_>, global: &DispatchStore) -> UnitSummaries {
    let mut summaries = UnitSummaries::new();
    let mut passes = 0_u32;

    let mut changed = true;
    while changed {
        passes += 1;
        changed = summarize_pass(scope, &mut summaries, global);
        tracing::trace!(passes, changed, "summary pass");
    }

    tracing::debug!(passes, functions = summaries.len(), "summaries converged");
    summaries
}

/// One full pass over the unit. Returns `true` if any summary grew.
pub fn summarize_pass(
    scope: &UnitScope<'_>,
    summaries: &mut UnitSummaries,
    global: &DispatchStore,
) -> bool {
    let table = DispatchTable::build(scope, summaries);
    let view = DispatchView::new(&table, global, scope.path());

    let mut changed = false;
    for func in &scope.unit().functions {
        let env = Env {
            scope,
            summaries: &*summaries,
            dispatch: &view,
        };
        let Some(derived) = derive(func, &env) else {
            continue;
        };
        changed |= summaries.merge(&func.func, &derived);
    }
    summaries.dispatch_reads.extend(view.into_reads());
    changed
}

/// Derive one function's summary from its body and graph.
///
/// `None` for functions that neither return nor accept errors.
fn derive(func: &Function, env: &Env<'_>) -> Option<FunctionSummary> {
    let returns_error = func.has_error_result();
    let takes_error = func.has_error_param();
    if !returns_error && !takes_error {
        return None;
    }

    let mut summary = FunctionSummary::default();
    if returns_error {
        if let Some(body) = &func.body {
            returns::Resolver::new(func, env).function_returns(body, &mut summary);
        }
        if let Some(graph) = &func.graph {
            trace::trace_returns(func, graph, env, &mut summary);
        }
    }
    if takes_error {
        if let Some(body) = &func.body {
            checked::collect_checked(func, body, env, &mut summary.checked);
        }
    }
    Some(summary)
}

/// Publish the summaries of the unit's exported functions.
///
/// Identities the unit does not export are filtered out; they stay
/// enforced inside the unit through [`UnitSummaries`]. Returns the number of
/// facts written.
pub fn export_summaries(
    scope: &UnitScope<'_>,
    summaries: &UnitSummaries,
    store: &mut dyn FactStore,
) -> Result<usize, FactError> {
    let decls = scope.decls();
    let visible = |id: &ErrorIdentity| decls.is_exported(id);
    let mut written = 0;

    for func in scope.unit().functions.iter().filter(|f| f.exported) {
        let Some(summary) = summaries.get(&func.func) else {
            continue;
        };
        let key = EntityKey::func(&func.func);
        if func.has_error_result() {
            let errors = summary.errors.filtered(visible);
            store.export_fact(&key, Fact::FunctionError(errors.to_fact()))?;
            store.export_fact(&key, Fact::ParameterFlow(summary.param_flows.to_param_fact()))?;
            store.export_fact(
                &key,
                Fact::CallbackFlow(summary.callback_flows.to_callback_fact()),
            )?;
            written += 3;
        }
        if func.has_error_param() {
            let checked = summary.checked.filtered(visible);
            store.export_fact(&key, Fact::CheckedParam(checked.to_fact()))?;
            written += 1;
        }
    }

    tracing::debug!(unit = %scope.path(), facts = written, "summaries exported");
    Ok(written)
}
