//! Syntax-directed return walk.
//!
//! Resolves the error-slot expression of every `return` to identities,
//! parameter flows and callback flows:
//!
//! - sentinel globals and composite literals of error types are identities;
//! - a re-raise (`FormatError` with `%w`) resolves its bound argument,
//!   tagged `wrapped`;
//! - a call contributes its callee's errors, then maps the callee's
//!   parameter and callback flows back onto the call's arguments;
//! - a local resolves through every assignment to it anywhere in the body
//!   (flow-insensitive), bounded by [`MAX_TRACE_DEPTH`] and a visited set;
//! - an error parameter is a parameter flow, invoking a function-typed
//!   parameter is a callback flow;
//! - inside a switch case that narrows a local, `return local` contributes
//!   only the narrowed identities.
//!
//! Function literals are resolved by walking their own returns, which is
//! also how the checker learns what a callback argument produces.

use rustc_hash::{FxHashMap, FxHashSet};

use errflow_facts::{ErrorIdentity, ErrorSummary, FunctionSummary};
use errflow_ir::visitor::{walk_stmt, Visitor};
use errflow_ir::{Block, Builtin, Call, Callee, Expr, Function, Lit, LocalId, Stmt, Ty};

use crate::discriminate::case_narrowing;
use crate::env::Env;
use crate::stack::ensure_sufficient_stack;
use crate::summarize::MAX_TRACE_DEPTH;
use crate::wrap::reraised_args;

/// Locals narrowed by the enclosing switch cases.
type Narrowing = FxHashMap<LocalId, Vec<ErrorIdentity>>;

/// `(local, wrapped, invoked)` already resolved in one query.
type Visited = FxHashSet<(LocalId, bool, bool)>;

/// One assignment feeding a local.
#[derive(Clone, Copy, Debug)]
enum Source<'r> {
    Value(&'r Expr),
    /// Result `index` of a multi-result call.
    Result { call: &'r Call, index: usize },
}

/// Flow-insensitive resolver over one function body.
pub(crate) struct Resolver<'r> {
    func: &'r Function,
    env: &'r Env<'r>,
    assigns: FxHashMap<LocalId, Vec<Source<'r>>>,
}

impl<'r> Resolver<'r> {
    pub(crate) fn new(func: &'r Function, env: &'r Env<'r>) -> Self {
        let mut assigns = Assignments::default();
        if let Some(body) = &func.body {
            assigns.visit_block(body);
        }
        Resolver {
            func,
            env,
            assigns: assigns.sources,
        }
    }

    /// Resolve every return of the function body into `out`.
    pub(crate) fn function_returns(&self, body: &'r Block, out: &mut FunctionSummary) {
        self.returns_in(body, &self.func.results, &Narrowing::default(), false, 0, out);
    }

    /// Identities `expr` may hold.
    pub(crate) fn expr_errors(&self, expr: &'r Expr) -> ErrorSummary {
        let mut out = FunctionSummary::default();
        self.expr(expr, false, 0, &mut Visited::default(), &mut out);
        out.errors
    }

    /// Identities invoking the function value `expr` may return.
    pub(crate) fn callback_errors(&self, expr: &'r Expr) -> ErrorSummary {
        let mut out = FunctionSummary::default();
        self.callback(expr, false, 0, &mut Visited::default(), &mut out);
        out.errors
    }

    /// Identities invoking the function-typed local `local` may return.
    pub(crate) fn local_call_errors(&self, local: LocalId) -> ErrorSummary {
        let mut out = FunctionSummary::default();
        self.invoke_local(local, false, 0, &mut Visited::default(), &mut out);
        out.errors
    }

    // ── Statements ──────────────────────────────────────────

    fn returns_in(
        &self,
        block: &'r Block,
        results: &'r [Ty],
        narrow: &Narrowing,
        wrapped: bool,
        depth: usize,
        out: &mut FunctionSummary,
    ) {
        for stmt in &block.stmts {
            ensure_sufficient_stack(|| {
                self.stmt_returns(stmt, results, narrow, wrapped, depth, out);
            });
        }
    }

    fn stmt_returns(
        &self,
        stmt: &'r Stmt,
        results: &'r [Ty],
        narrow: &Narrowing,
        wrapped: bool,
        depth: usize,
        out: &mut FunctionSummary,
    ) {
        match stmt {
            Stmt::Return { values, .. } => {
                self.return_values(values, results, narrow, wrapped, depth, out);
            }
            Stmt::If {
                then_block,
                else_block,
                ..
            } => {
                self.returns_in(then_block, results, narrow, wrapped, depth, out);
                if let Some(else_block) = else_block {
                    self.returns_in(else_block, results, narrow, wrapped, depth, out);
                }
            }
            Stmt::Switch { subject, cases, .. } => {
                for case in cases {
                    let narrowed =
                        case_narrowing(subject.as_ref(), case, self.env.scope, &self.func.locals);
                    if narrowed.is_empty() {
                        self.returns_in(&case.body, results, narrow, wrapped, depth, out);
                        continue;
                    }
                    let mut by_local = Narrowing::default();
                    for (local, identity) in narrowed {
                        by_local.entry(local).or_default().push(identity);
                    }
                    let mut inner = narrow.clone();
                    inner.extend(by_local);
                    self.returns_in(&case.body, results, &inner, wrapped, depth, out);
                }
            }
            Stmt::Loop { body, .. } | Stmt::Block(body) => {
                self.returns_in(body, results, narrow, wrapped, depth, out);
            }
            Stmt::Assign { .. } | Stmt::Expr(_) => {}
        }
    }

    fn return_values(
        &self,
        values: &'r [Expr],
        results: &'r [Ty],
        narrow: &Narrowing,
        wrapped: bool,
        depth: usize,
        out: &mut FunctionSummary,
    ) {
        if values.len() == results.len() {
            for (value, ty) in values.iter().zip(results) {
                if ty.is_error() {
                    self.returned(value, narrow, wrapped, depth, out);
                }
            }
        } else if let [Expr::Call(call)] = values {
            // `return f()` forwarding every result of a multi-result call
            self.call(call, wrapped, depth, &mut Visited::default(), out);
        }
    }

    fn returned(
        &self,
        value: &'r Expr,
        narrow: &Narrowing,
        wrapped: bool,
        depth: usize,
        out: &mut FunctionSummary,
    ) {
        if let Some(narrowed) = value.as_local().and_then(|local| narrow.get(&local)) {
            for identity in narrowed {
                out.errors.insert(identity.clone(), wrapped);
            }
            return;
        }
        self.expr(value, wrapped, depth, &mut Visited::default(), out);
    }

    // ── Expressions ─────────────────────────────────────────

    fn expr(
        &self,
        expr: &'r Expr,
        wrapped: bool,
        depth: usize,
        visited: &mut Visited,
        out: &mut FunctionSummary,
    ) {
        if depth > MAX_TRACE_DEPTH {
            return;
        }
        let scope = self.env.scope;
        match expr {
            Expr::Global(global) => {
                if let Some(identity) = scope.global_identity(global) {
                    out.errors.insert(identity, wrapped);
                }
            }
            Expr::Composite { ty } => {
                if let Some(identity) = scope.type_identity(ty) {
                    out.errors.insert(identity, wrapped);
                }
            }
            Expr::AddrOf(inner) => self.expr(inner, wrapped, depth + 1, visited, out),
            Expr::TypeAssert { value, ty } => match scope.ty_identity(ty) {
                Some(identity) => {
                    out.errors.insert(identity, wrapped);
                }
                None if ty.is_error() => self.expr(value, wrapped, depth + 1, visited, out),
                None => {}
            },
            Expr::Local(local) => self.local(*local, wrapped, depth, visited, out),
            Expr::Call(call) => self.call(call, wrapped, depth, visited, out),
            _ => {}
        }
    }

    fn local(
        &self,
        local: LocalId,
        wrapped: bool,
        depth: usize,
        visited: &mut Visited,
        out: &mut FunctionSummary,
    ) {
        if let Some(index) = self.param_index(local, Ty::is_error) {
            out.param_flows.insert(index, wrapped);
        }
        if !visited.insert((local, wrapped, false)) {
            return;
        }
        let Some(sources) = self.assigns.get(&local) else {
            return;
        };
        for source in sources {
            match *source {
                Source::Value(value) => self.expr(value, wrapped, depth + 1, visited, out),
                Source::Result { call, index } => {
                    if call.results.get(index).is_some_and(Ty::is_error) {
                        self.call(call, wrapped, depth + 1, visited, out);
                    }
                }
            }
        }
    }

    fn call(
        &self,
        call: &'r Call,
        wrapped: bool,
        depth: usize,
        visited: &mut Visited,
        out: &mut FunctionSummary,
    ) {
        if depth > MAX_TRACE_DEPTH {
            return;
        }
        match &call.callee {
            Callee::Builtin(Builtin::FormatError) => {
                let Some(Expr::Lit(Lit::Str(template))) = call.args.first() else {
                    return;
                };
                for index in reraised_args(template) {
                    if let Some(arg) = call.args.get(index + 1) {
                        self.expr(arg, true, depth + 1, visited, out);
                    }
                }
            }
            Callee::Builtin(_) => {}
            Callee::Local(local) => self.invoke_local(*local, wrapped, depth + 1, visited, out),
            callee => {
                if let Some(summary) = self.env.call_summary(callee) {
                    self.apply(&summary, &call.args, wrapped, depth + 1, visited, out);
                }
            }
        }
    }

    /// Contribute a callee summary, mapping its flows onto `args`.
    fn apply(
        &self,
        summary: &FunctionSummary,
        args: &'r [Expr],
        wrapped: bool,
        depth: usize,
        visited: &mut Visited,
        out: &mut FunctionSummary,
    ) {
        for (identity, reached_wrapped) in summary.errors.iter() {
            out.errors.insert(identity.clone(), wrapped || reached_wrapped);
        }
        for (index, flow_wrapped) in summary.param_flows.iter() {
            if let Some(arg) = args.get(index as usize) {
                self.expr(arg, wrapped || flow_wrapped, depth, visited, out);
            }
        }
        for (index, flow_wrapped) in summary.callback_flows.iter() {
            if let Some(arg) = args.get(index as usize) {
                self.callback(arg, wrapped || flow_wrapped, depth, visited, out);
            }
        }
    }

    // ── Callbacks ───────────────────────────────────────────

    /// What invoking the function value `expr` returns.
    fn callback(
        &self,
        expr: &'r Expr,
        wrapped: bool,
        depth: usize,
        visited: &mut Visited,
        out: &mut FunctionSummary,
    ) {
        if depth > MAX_TRACE_DEPTH {
            return;
        }
        match expr {
            Expr::FuncLit(lit) => {
                self.returns_in(&lit.body, &lit.results, &Narrowing::default(), wrapped, depth + 1, out);
            }
            Expr::Func(func) => {
                if let Some(summary) = self.env.function_summary(func) {
                    self.apply(summary, &[], wrapped, depth + 1, visited, out);
                }
            }
            Expr::Local(local) => self.invoke_local(*local, wrapped, depth, visited, out),
            _ => {}
        }
    }

    fn invoke_local(
        &self,
        local: LocalId,
        wrapped: bool,
        depth: usize,
        visited: &mut Visited,
        out: &mut FunctionSummary,
    ) {
        if let Some(index) = self.param_index(local, |ty| ty.as_func().is_some()) {
            out.callback_flows.insert(index, wrapped);
        }
        if !visited.insert((local, wrapped, true)) {
            return;
        }
        let Some(sources) = self.assigns.get(&local) else {
            return;
        };
        for source in sources {
            if let Source::Value(value) = *source {
                self.callback(value, wrapped, depth + 1, visited, out);
            }
        }
    }

    /// Flow index of `local` if it is an ordinary parameter whose type
    /// satisfies `accept`.
    fn param_index(&self, local: LocalId, accept: impl Fn(&Ty) -> bool) -> Option<u32> {
        let index = self.func.param_index(local)?;
        let param = self.func.params.get(index)?;
        if accept(&param.ty) {
            u32::try_from(index).ok()
        } else {
            None
        }
    }
}

/// Every assignment in a body, function literals included, keyed by target.
#[derive(Default)]
struct Assignments<'r> {
    sources: FxHashMap<LocalId, Vec<Source<'r>>>,
}

impl<'r> Assignments<'r> {
    fn record(&mut self, targets: &'r [Option<LocalId>], value: &'r Expr) {
        match (targets, value) {
            ([Some(target)], _) => self.push(*target, Source::Value(value)),
            (_, Expr::Call(call)) => {
                for (index, target) in targets.iter().enumerate() {
                    if let Some(target) = target {
                        self.push(*target, Source::Result { call: &**call, index });
                    }
                }
            }
            // `v, ok := x.(T)`: only the first target carries the value
            _ => {
                if let Some(Some(first)) = targets.first() {
                    self.push(*first, Source::Value(value));
                }
            }
        }
    }

    fn push(&mut self, local: LocalId, source: Source<'r>) {
        self.sources.entry(local).or_default().push(source);
    }
}

impl<'r> Visitor<'r> for Assignments<'r> {
    fn visit_stmt(&mut self, stmt: &'r Stmt) {
        if let Stmt::Assign { targets, value, .. } = stmt {
            self.record(targets, value);
        }
        walk_stmt(self, stmt);
    }
}
