//! Call-site checker: flow-sensitive obligation tracking per function body.
//!
//! # Rules
//!
//! - Binding a call result whose effective error set is non-empty creates
//!   an [`Obligation`] on the target variable. Any previous binding is
//!   flushed first.
//! - Discriminations discharge the identity they test.
//! - Branches walk clones of the state and OR-merge them afterwards. A
//!   switch without a default case also merges the state before the switch.
//!   Loop bodies merge with the zero-iteration state.
//! - A narrowing switch case restricts what forwarding the variable
//!   propagates to the identities the case narrowed to.
//! - Returning a tracked variable, or re-raising it with `%w`, propagates
//!   it when the enclosing function (or literal) has an error result.
//! - Passing a tracked variable at a parameter-flow position transfers it;
//!   at a checked-parameter position only the checked identities are
//!   discharged.
//! - Whatever is left when a binding ends is reported, once per origin and
//!   identity.
//!
//! The effective error set of a call is its callee's errors, plus what its
//! callback arguments return, plus the remaining identities of tracked
//! variables passed at parameter-flow positions.

mod state;

use std::cell::RefCell;

use errflow_diagnostic::{DedupKey, Diagnostic};
use errflow_facts::{DispatchKey, DispatchStore, ErrorSummary, FunctionSummary};
use errflow_ir::{Block, Builtin, Call, Callee, Expr, FuncLit, Function, Lit, LocalId, Stmt};
use smallvec::SmallVec;

use crate::discriminate::{case_narrowing, discriminations};
use crate::env::{DispatchSource, Env};
use crate::scope::UnitScope;
use crate::stack::ensure_sufficient_stack;
use crate::summarize::returns::Resolver;
use crate::summarize::UnitSummaries;
use crate::wrap::reraised_args;

pub use state::{identity_set, FlowState, IdentitySet, Obligation};

/// Outcome of checking one function.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FunctionCheck {
    /// Reports with their dedup keys.
    pub diagnostics: Vec<(DedupKey, Diagnostic)>,
    /// Dispatch keys that had no entry in the global store.
    pub misses: Vec<DispatchKey>,
}

impl FunctionCheck {
    pub fn is_deferrable(&self) -> bool {
        !self.misses.is_empty()
    }
}

/// Global dispatch lookup that remembers misses.
struct RecordingDispatch<'a> {
    store: &'a DispatchStore,
    misses: RefCell<Vec<DispatchKey>>,
}

impl DispatchSource for RecordingDispatch<'_> {
    fn dispatch_summary(&self, key: &DispatchKey) -> Option<FunctionSummary> {
        let summary = self.store.get(key);
        if summary.is_none() {
            let mut misses = self.misses.borrow_mut();
            if !misses.contains(key) {
                misses.push(key.clone());
            }
        }
        summary
    }
}

/// Check one function body against the summaries of `scope`'s unit and the
/// global dispatch store.
pub fn check_function(
    func: &Function,
    scope: &UnitScope<'_>,
    summaries: &UnitSummaries,
    store: &DispatchStore,
) -> FunctionCheck {
    let Some(body) = &func.body else {
        return FunctionCheck::default();
    };
    let dispatch = RecordingDispatch {
        store,
        misses: RefCell::new(Vec::new()),
    };
    let env = Env {
        scope,
        summaries,
        dispatch: &dispatch,
    };

    let mut checker = Checker {
        func,
        env: &env,
        resolver: Resolver::new(func, &env),
        reports: Vec::new(),
    };
    let mut state = FlowState::new();
    checker.block(body, &mut state, func.has_error_result());
    for obligation in state.drain() {
        checker.flush(&obligation);
    }

    let diagnostics = checker.reports;
    let misses = dispatch.misses.into_inner();
    if !misses.is_empty() {
        tracing::trace!(func = %func.func, misses = misses.len(), "dispatch facts missing");
    }
    FunctionCheck {
        diagnostics,
        misses,
    }
}

struct Checker<'c> {
    func: &'c Function,
    env: &'c Env<'c>,
    resolver: Resolver<'c>,
    reports: Vec<(DedupKey, Diagnostic)>,
}

impl<'c> Checker<'c> {
    // ── Statements ──────────────────────────────────────────

    fn block(&mut self, block: &'c Block, state: &mut FlowState, may_propagate: bool) {
        for stmt in &block.stmts {
            ensure_sufficient_stack(|| self.stmt(stmt, state, may_propagate));
        }
    }

    fn stmt(&mut self, stmt: &'c Stmt, state: &mut FlowState, may_propagate: bool) {
        match stmt {
            Stmt::Assign { targets, value, .. } => self.assign(targets, value, state),
            Stmt::Expr(expr) => self.eval(expr, state),
            Stmt::If {
                init,
                cond,
                then_block,
                else_block,
                ..
            } => {
                if let Some(init) = init {
                    self.stmt(init, state, may_propagate);
                }
                self.eval(cond, state);

                let mut then_state = state.clone();
                self.block(then_block, &mut then_state, may_propagate);
                if let Some(else_block) = else_block {
                    self.block(else_block, state, may_propagate);
                }
                state.merge(then_state);
            }
            Stmt::Switch {
                init,
                subject,
                cases,
                ..
            } => {
                if let Some(init) = init {
                    self.stmt(init, state, may_propagate);
                }
                if let Some(subject) = subject {
                    self.eval(subject, state);
                }

                let before = state.clone();
                let mut merged: Option<FlowState> = None;
                for case in cases {
                    let mut branch = before.clone();
                    for pattern in &case.patterns {
                        if let errflow_ir::CasePattern::Value(expr) = pattern {
                            self.eval(expr, &mut branch);
                        }
                    }
                    let narrowed = case_narrowing(
                        subject.as_ref(),
                        case,
                        self.env.scope,
                        &self.func.locals,
                    );
                    for (local, identity) in narrowed {
                        if let Some(obligation) = branch.get_mut(local) {
                            obligation.discharge(&identity);
                            obligation.restrict(identity);
                        }
                    }
                    self.block(&case.body, &mut branch, may_propagate);
                    branch.clear_restrictions();
                    match &mut merged {
                        Some(merged) => merged.merge(branch),
                        None => merged = Some(branch),
                    }
                }

                let mut result = merged.unwrap_or_else(|| before.clone());
                if !cases.iter().any(errflow_ir::SwitchCase::is_default) {
                    result.merge(before);
                }
                *state = result;
            }
            Stmt::Loop { body, .. } => {
                let mut iteration = state.clone();
                self.block(body, &mut iteration, may_propagate);
                state.merge(iteration);
            }
            Stmt::Return { values, .. } => {
                for value in values {
                    self.eval(value, state);
                }
                if may_propagate {
                    for value in values {
                        self.forward(value, state);
                    }
                }
            }
            Stmt::Block(block) => self.block(block, state, may_propagate),
        }
    }

    fn assign(&mut self, targets: &'c [Option<LocalId>], value: &'c Expr, state: &mut FlowState) {
        match value {
            Expr::Call(call) => {
                let effective = if call.returns_error() {
                    self.effective_errors(call, state)
                } else {
                    IdentitySet::new()
                };
                self.eval(value, state);

                // `err = FormatError("ctx: %w", err)` moves the old binding
                // into the new one
                if !effective.is_empty() && targets.iter().any(Option::is_some) {
                    for local in self.reraised_locals(call) {
                        if let Some(obligation) = state.get_mut(local) {
                            obligation.discharge_all();
                        }
                    }
                }
                for (index, target) in targets.iter().enumerate() {
                    let Some(target) = *target else {
                        continue;
                    };
                    let error_slot = if targets.len() == call.results.len() {
                        call.results.get(index).is_some_and(errflow_ir::Ty::is_error)
                    } else {
                        targets.len() == 1 && call.returns_error()
                    };
                    if error_slot && !effective.is_empty() {
                        let obligation = Obligation::new(call.span, effective.clone());
                        if let Some(previous) = state.bind(target, obligation) {
                            self.flush(&previous);
                        }
                    } else {
                        self.release(target, state);
                    }
                }
            }
            Expr::Local(source) if matches!(targets, [Some(_)]) && state.is_tracked(*source) => {
                let [Some(target)] = targets else {
                    return;
                };
                if target == source {
                    return;
                }
                if let Some(moved) = state.unbind(*source) {
                    if let Some(previous) = state.bind(*target, moved) {
                        self.flush(&previous);
                    }
                }
            }
            _ => {
                self.eval(value, state);
                for target in targets.iter().flatten() {
                    self.release(*target, state);
                }
            }
        }
    }

    // ── Expressions ─────────────────────────────────────────

    /// Apply everything evaluating `expr` does to the state: call effects,
    /// function literals, then discriminations.
    fn eval(&mut self, expr: &'c Expr, state: &mut FlowState) {
        self.effects(expr, state);
        for (local, identity) in discriminations(expr, self.env.scope, &self.func.locals) {
            if let Some(obligation) = state.get_mut(local) {
                obligation.discharge(&identity);
            }
        }
    }

    fn effects(&mut self, expr: &'c Expr, state: &mut FlowState) {
        match expr {
            Expr::Call(call) => {
                if let Some(receiver) = &call.receiver {
                    self.effects(receiver, state);
                }
                for arg in &call.args {
                    self.effects(arg, state);
                }
                self.call_effects(call, state);
            }
            Expr::FuncLit(lit) => self.func_lit(lit, state),
            Expr::Binary { lhs, rhs, .. } => {
                self.effects(lhs, state);
                self.effects(rhs, state);
            }
            Expr::Not(inner) | Expr::AddrOf(inner) => self.effects(inner, state),
            Expr::TypeAssert { value, .. } => self.effects(value, state),
            Expr::Field { base, .. } => self.effects(base, state),
            Expr::Index { base, index } => {
                self.effects(base, state);
                self.effects(index, state);
            }
            Expr::Local(_)
            | Expr::Global(_)
            | Expr::Func(_)
            | Expr::Lit(_)
            | Expr::Nil
            | Expr::Composite { .. } => {}
        }
    }

    /// Transfers and checked-parameter discharges of one call.
    fn call_effects(&mut self, call: &'c Call, state: &mut FlowState) {
        let Some(summary) = self.env.call_summary(&call.callee) else {
            return;
        };
        for (index, _) in summary.param_flows.iter() {
            let Some(local) = call.args.get(index as usize).and_then(Expr::as_local) else {
                continue;
            };
            if let Some(obligation) = state.get_mut(local) {
                obligation.discharge_all();
            }
        }
        for (index, identities) in summary.checked.iter() {
            let Some(local) = call.args.get(index as usize).and_then(Expr::as_local) else {
                continue;
            };
            if let Some(obligation) = state.get_mut(local) {
                for identity in identities {
                    obligation.discharge(identity);
                }
            }
        }
    }

    /// Identities a call's error result may carry, as seen from the call
    /// site.
    fn effective_errors(&self, call: &'c Call, state: &FlowState) -> IdentitySet {
        let mut errors = ErrorSummary::new();
        match &call.callee {
            Callee::Builtin(Builtin::FormatError) => {
                if let Some(Expr::Lit(Lit::Str(template))) = call.args.first() {
                    for index in reraised_args(template) {
                        if let Some(arg) = call.args.get(index + 1) {
                            errors.union(&self.value_errors(arg, state));
                        }
                    }
                }
            }
            Callee::Builtin(_) => {}
            Callee::Local(local) => {
                errors.union(&self.resolver.local_call_errors(*local));
            }
            callee => {
                if let Some(summary) = self.env.call_summary(callee) {
                    errors.union(&summary.errors);
                    for (index, _) in summary.callback_flows.iter() {
                        if let Some(arg) = call.args.get(index as usize) {
                            errors.union(&self.resolver.callback_errors(arg));
                        }
                    }
                    for (index, _) in summary.param_flows.iter() {
                        if let Some(arg) = call.args.get(index as usize) {
                            errors.union(&self.value_errors(arg, state));
                        }
                    }
                }
            }
        }
        let scope = self.env.scope;
        identity_set(errors.identities().filter(|id| scope.is_tracked(id)))
    }

    /// Identities an argument value carries into a parameter flow.
    fn value_errors(&self, expr: &'c Expr, state: &FlowState) -> ErrorSummary {
        match expr {
            Expr::Local(local) if state.is_tracked(*local) => state
                .get(*local)
                .map(|obligation| obligation.remaining().map(|id| (id.clone(), false)).collect())
                .unwrap_or_default(),
            Expr::Call(call) => self
                .effective_errors(call, state)
                .into_iter()
                .map(|id| (id, false))
                .collect(),
            _ => self.resolver.expr_errors(expr),
        }
    }

    /// Tracked locals a `%w` re-raise call binds.
    fn reraised_locals(&self, call: &Call) -> SmallVec<[LocalId; 1]> {
        let Callee::Builtin(Builtin::FormatError) = call.callee else {
            return SmallVec::new();
        };
        let Some(Expr::Lit(Lit::Str(template))) = call.args.first() else {
            return SmallVec::new();
        };
        reraised_args(template)
            .into_iter()
            .filter_map(|index| call.args.get(index + 1).and_then(Expr::as_local))
            .collect()
    }

    /// Propagation through a returned value.
    fn forward(&mut self, value: &'c Expr, state: &mut FlowState) {
        match value {
            Expr::Local(local) => {
                if let Some(obligation) = state.get_mut(*local) {
                    obligation.propagate();
                }
            }
            Expr::Call(call) => {
                for local in self.reraised_locals(call) {
                    if let Some(obligation) = state.get_mut(local) {
                        obligation.propagate();
                    }
                }
            }
            _ => {}
        }
    }

    fn func_lit(&mut self, lit: &'c FuncLit, state: &mut FlowState) {
        let mut inner = state.clone();
        self.block(&lit.body, &mut inner, lit.has_error_result());
        for ended in state.absorb_literal(inner) {
            self.flush(&ended);
        }
    }

    // ── Reporting ───────────────────────────────────────────

    /// End the binding of `local`, reporting what it still owes.
    fn release(&mut self, local: LocalId, state: &mut FlowState) {
        if let Some(previous) = state.unbind(local) {
            self.flush(&previous);
        }
    }

    fn flush(&mut self, obligation: &Obligation) {
        let unit = self.env.scope.path();
        for identity in obligation.remaining() {
            let key: DedupKey = (unit.to_owned(), obligation.origin, identity.to_string());
            let message = format!("error {identity} is neither checked nor propagated");
            self.reports
                .push((key, Diagnostic::new(unit, obligation.origin, message)));
        }
    }
}

#[cfg(test)]
mod tests;
