//! Checked-parameter scan: which identities a function discriminates on
//! each of its error parameters.
//!
//! A caller passing a tracked error into such a parameter gets those
//! identities discharged. Checks made by callees on the same value count
//! too, through their own checked-parameter summaries.

use errflow_facts::{CheckedSummary, ErrorIdentity};
use errflow_ir::visitor::{walk_call, walk_expr, walk_stmt, Visitor};
use errflow_ir::{Block, Call, Expr, Function, LocalId, Stmt};

use crate::discriminate::{case_narrowing, discrimination};
use crate::env::Env;

pub(super) fn collect_checked(
    func: &Function,
    body: &Block,
    env: &Env<'_>,
    out: &mut CheckedSummary,
) {
    let mut scan = CheckedParams { func, env, out };
    scan.visit_block(body);
}

struct CheckedParams<'c> {
    func: &'c Function,
    env: &'c Env<'c>,
    out: &'c mut CheckedSummary,
}

impl CheckedParams<'_> {
    fn checked(&mut self, local: LocalId, identity: ErrorIdentity) {
        let Some(index) = self.func.param_index(local) else {
            return;
        };
        let is_error = self.func.params.get(index).is_some_and(|p| p.ty.is_error());
        if let (true, Ok(index)) = (is_error, u32::try_from(index)) {
            self.out.insert(index, identity);
        }
    }
}

impl<'ast> Visitor<'ast> for CheckedParams<'_> {
    fn visit_stmt(&mut self, stmt: &'ast Stmt) {
        if let Stmt::Switch {
            subject: Some(subject),
            cases,
            ..
        } = stmt
        {
            for case in cases {
                for (local, identity) in
                    case_narrowing(Some(subject), case, self.env.scope, &self.func.locals)
                {
                    self.checked(local, identity);
                }
            }
        }
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &'ast Expr) {
        if let Some((local, identity)) = discrimination(expr, self.env.scope, &self.func.locals) {
            self.checked(local, identity);
        }
        walk_expr(self, expr);
    }

    fn visit_call(&mut self, call: &'ast Call) {
        if let Some(summary) = self.env.call_summary(&call.callee) {
            for (index, identities) in summary.checked.iter() {
                let Some(local) = call.args.get(index as usize).and_then(Expr::as_local) else {
                    continue;
                };
                for identity in identities {
                    self.checked(local, identity.clone());
                }
            }
        }
        walk_call(self, call);
    }
}
