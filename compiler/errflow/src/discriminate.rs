//! Recognition of discriminations: expressions that test an error value
//! against one identity.
//!
//! - `IsError(v, Sentinel)` / `IsError(v, &T{})`
//! - `AsError(v, &target)` where `target` has a nominal error type
//! - `v == Sentinel`, `Sentinel == v` (and `!=`)
//! - `v.(T)` / `v.(*T)`
//! - inside a switch: value cases against a tracked subject and type cases
//!   of a type switch

use errflow_facts::ErrorIdentity;
use errflow_ir::visitor::{walk_expr, Visitor};
use errflow_ir::{BinOp, Builtin, Callee, CasePattern, Expr, FuncLit, LocalId, SwitchCase, Ty};

use crate::scope::UnitScope;

/// The local tested and the identity it is tested against.
pub type Discrimination = (LocalId, ErrorIdentity);

/// The discrimination `expr` itself performs, if any. Subexpressions are not
/// inspected.
pub fn discrimination(expr: &Expr, scope: &UnitScope<'_>, locals: &[Ty]) -> Option<Discrimination> {
    match expr {
        Expr::Call(call) => {
            let Callee::Builtin(builtin) = call.callee else {
                return None;
            };
            let (Some(subject), Some(target)) = (call.args.first(), call.args.get(1)) else {
                return None;
            };
            let local = subject.as_local()?;
            let identity = match builtin {
                Builtin::IsError => target_identity(target, scope)?,
                Builtin::AsError => match target.peel_addr() {
                    Expr::Local(target) => scope.ty_identity(locals.get(target.index())?)?,
                    other => target_identity(other, scope)?,
                },
                Builtin::NewError | Builtin::FormatError => return None,
            };
            Some((local, identity))
        }
        Expr::Binary {
            op: BinOp::Eq | BinOp::Ne,
            lhs,
            rhs,
        } => match (lhs.as_local(), rhs.as_local()) {
            (Some(local), None) => Some((local, target_identity(rhs, scope)?)),
            (None, Some(local)) => Some((local, target_identity(lhs, scope)?)),
            _ => None,
        },
        Expr::TypeAssert { value, ty } => Some((value.as_local()?, scope.ty_identity(ty)?)),
        _ => None,
    }
}

/// Every discrimination anywhere in `expr`, outside function literals.
pub fn discriminations(expr: &Expr, scope: &UnitScope<'_>, locals: &[Ty]) -> Vec<Discrimination> {
    let mut collector = Collector {
        scope,
        locals,
        found: Vec::new(),
    };
    collector.visit_expr(expr);
    collector.found
}

/// The narrowing one switch case applies.
///
/// With a subject local, value patterns are compared against it and type
/// patterns test its dynamic type. Without a subject, each pattern is a
/// condition and contributes its discriminations.
pub fn case_narrowing(
    subject: Option<&Expr>,
    case: &SwitchCase,
    scope: &UnitScope<'_>,
    locals: &[Ty],
) -> Vec<Discrimination> {
    match subject {
        Some(subject) => {
            let Some(local) = subject.as_local() else {
                return Vec::new();
            };
            case.patterns
                .iter()
                .filter_map(|pattern| match pattern {
                    CasePattern::Value(value) => target_identity(value, scope),
                    CasePattern::Type(ty) => scope.ty_identity(ty),
                })
                .map(|identity| (local, identity))
                .collect()
        }
        None => case
            .patterns
            .iter()
            .flat_map(|pattern| match pattern {
                CasePattern::Value(cond) => discriminations(cond, scope, locals),
                CasePattern::Type(_) => Vec::new(),
            })
            .collect(),
    }
}

/// The identity an expression names as a comparison target.
fn target_identity(expr: &Expr, scope: &UnitScope<'_>) -> Option<ErrorIdentity> {
    match expr.peel_addr() {
        Expr::Global(global) => scope.global_identity(global),
        Expr::Composite { ty } => scope.type_identity(ty),
        _ => None,
    }
}

struct Collector<'c> {
    scope: &'c UnitScope<'c>,
    locals: &'c [Ty],
    found: Vec<Discrimination>,
}

impl<'ast> Visitor<'ast> for Collector<'_> {
    fn visit_expr(&mut self, expr: &'ast Expr) {
        if let Some(found) = discrimination(expr, self.scope, self.locals) {
            self.found.push(found);
        }
        walk_expr(self, expr);
    }

    fn visit_func_lit(&mut self, _lit: &'ast FuncLit) {}
}
