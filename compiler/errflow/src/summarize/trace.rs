//! Backward value-dataflow trace.
//!
//! Each error-slot operand of each return instruction is followed backward
//! through the node taxonomy of [`ValueKind`]:
//!
//! | Node | Action |
//! |------|--------|
//! | `Call` | callee summary; flows mapped onto arguments |
//! | `Extract` | the producing call |
//! | `Phi` | every edge |
//! | `Deref`, `MakeInterface` | the operand |
//! | `Alloc` | identity of the allocated type |
//! | `Global` | identity of the sentinel |
//! | `Param` | parameter flow |
//! | `FieldAddr`, `Lookup`, `Const`, `Nil`, `Opaque`, `Function` | stop |
//!
//! Field addresses and collection lookups are unsupported origins; the
//! trace gives up on them without reporting anything. The same holds when
//! [`MAX_TRACE_DEPTH`] is exceeded. Each node is followed at most once per
//! `wrapped` tag, as a value and as an invoked function, so cyclic merges
//! cost one visit.

use rustc_hash::FxHashSet;

use errflow_facts::FunctionSummary;
use errflow_ir::{Builtin, Function, GraphCallee, Lit, ValueGraph, ValueId, ValueKind};

use crate::env::Env;
use crate::wrap::reraised_args;

/// Maximum number of nodes followed from one return operand.
pub const MAX_TRACE_DEPTH: usize = 32;

/// `(value, wrapped, invoked)` already followed from one return operand.
type Visited = FxHashSet<(ValueId, bool, bool)>;

/// Trace every return instruction of `graph` into `out`.
pub(crate) fn trace_returns(
    func: &Function,
    graph: &ValueGraph,
    env: &Env<'_>,
    out: &mut FunctionSummary,
) {
    let tracer = Tracer { func, graph, env };
    for ret in &graph.returns {
        for (slot, ty) in func.results.iter().enumerate() {
            if !ty.is_error() {
                continue;
            }
            if let Some(&operand) = ret.operands.get(slot) {
                tracer.value(operand, false, 0, &mut Visited::default(), out);
            }
        }
    }
}

struct Tracer<'t> {
    func: &'t Function,
    graph: &'t ValueGraph,
    env: &'t Env<'t>,
}

impl Tracer<'_> {
    /// Ordinary parameter index of graph parameter `raw`; `None` for the
    /// receiver.
    fn param(&self, raw: u32) -> Option<usize> {
        (raw as usize).checked_sub(self.func.receiver_offset())
    }

    fn value(
        &self,
        id: ValueId,
        wrapped: bool,
        depth: usize,
        visited: &mut Visited,
        out: &mut FunctionSummary,
    ) {
        if depth > MAX_TRACE_DEPTH || !visited.insert((id, wrapped, false)) {
            return;
        }
        let Some(kind) = self.graph.get(id) else {
            return;
        };
        let scope = self.env.scope;
        match kind {
            ValueKind::Param(raw) => {
                let Some(index) = self.param(*raw) else {
                    return;
                };
                let is_error = self.func.params.get(index).is_some_and(|p| p.ty.is_error());
                if let (true, Ok(index)) = (is_error, u32::try_from(index)) {
                    out.param_flows.insert(index, wrapped);
                }
            }
            ValueKind::Call { callee, args } => {
                self.call(callee, args, wrapped, depth, visited, out);
            }
            ValueKind::Extract { tuple, .. } => match self.graph.get(*tuple) {
                Some(ValueKind::Call { callee, args }) => {
                    self.call(callee, args, wrapped, depth + 1, visited, out);
                }
                _ => self.value(*tuple, wrapped, depth + 1, visited, out),
            },
            ValueKind::Phi(edges) => {
                for &edge in edges {
                    self.value(edge, wrapped, depth + 1, visited, out);
                }
            }
            ValueKind::Deref(inner) | ValueKind::MakeInterface(inner) => {
                self.value(*inner, wrapped, depth + 1, visited, out);
            }
            ValueKind::Alloc(ty) => {
                if let Some(identity) = scope.type_identity(ty) {
                    out.errors.insert(identity, wrapped);
                }
            }
            ValueKind::Global(global) => {
                if let Some(identity) = scope.global_identity(global) {
                    out.errors.insert(identity, wrapped);
                }
            }
            ValueKind::Function(_)
            | ValueKind::FieldAddr { .. }
            | ValueKind::Lookup { .. }
            | ValueKind::Const(_)
            | ValueKind::Nil
            | ValueKind::Opaque => {}
        }
    }

    fn call(
        &self,
        callee: &GraphCallee,
        args: &[ValueId],
        wrapped: bool,
        depth: usize,
        visited: &mut Visited,
        out: &mut FunctionSummary,
    ) {
        let env = self.env;
        let (summary, offset) = match callee {
            GraphCallee::Builtin(Builtin::FormatError) => {
                let template = args.first().and_then(|&t| match self.graph.get(t) {
                    Some(ValueKind::Const(Lit::Str(template))) => Some(template),
                    _ => None,
                });
                for index in template.map(|t| reraised_args(t)).unwrap_or_default() {
                    if let Some(&arg) = args.get(index + 1) {
                        self.value(arg, true, depth + 1, visited, out);
                    }
                }
                return;
            }
            GraphCallee::Builtin(_) => return,
            GraphCallee::Value(func) => {
                self.callback(*func, wrapped, depth + 1, visited, out);
                return;
            }
            GraphCallee::Static(func) => (
                env.function_summary(func).cloned(),
                usize::from(func.is_method()),
            ),
            GraphCallee::Dynamic { iface, method } => (env.dispatch_summary(iface, method), 1),
        };
        let Some(summary) = summary else {
            return;
        };

        for (identity, reached_wrapped) in summary.errors.iter() {
            out.errors.insert(identity.clone(), wrapped || reached_wrapped);
        }
        for (index, flow_wrapped) in summary.param_flows.iter() {
            if let Some(&arg) = args.get(index as usize + offset) {
                self.value(arg, wrapped || flow_wrapped, depth + 1, visited, out);
            }
        }
        for (index, flow_wrapped) in summary.callback_flows.iter() {
            if let Some(&arg) = args.get(index as usize + offset) {
                self.callback(arg, wrapped || flow_wrapped, depth + 1, visited, out);
            }
        }
    }

    /// What invoking the function value `id` returns.
    fn callback(
        &self,
        id: ValueId,
        wrapped: bool,
        depth: usize,
        visited: &mut Visited,
        out: &mut FunctionSummary,
    ) {
        if depth > MAX_TRACE_DEPTH || !visited.insert((id, wrapped, true)) {
            return;
        }
        match self.graph.get(id) {
            Some(ValueKind::Param(raw)) => {
                let Some(index) = self.param(*raw) else {
                    return;
                };
                let is_func = self
                    .func
                    .params
                    .get(index)
                    .is_some_and(|p| p.ty.as_func().is_some());
                if let (true, Ok(index)) = (is_func, u32::try_from(index)) {
                    out.callback_flows.insert(index, wrapped);
                }
            }
            Some(ValueKind::Function(func)) => {
                if let Some(summary) = self.env.function_summary(func) {
                    for (identity, reached_wrapped) in summary.errors.iter() {
                        out.errors.insert(identity.clone(), wrapped || reached_wrapped);
                    }
                }
            }
            Some(ValueKind::Phi(edges)) => {
                for &edge in edges {
                    self.callback(edge, wrapped, depth + 1, visited, out);
                }
            }
            Some(ValueKind::MakeInterface(inner) | ValueKind::Deref(inner)) => {
                self.callback(*inner, wrapped, depth + 1, visited, out);
            }
            _ => {}
        }
    }
}
